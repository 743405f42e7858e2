//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了带 ZedToken 缓存的权限服务客户端。
//!
//! 读请求：一致性字段为空时默认使用完全一致性；如果缓存中有目标对象的令牌，
//! 则降级为"至少与令牌一样新"。成功响应中的令牌会写回缓存。
//!
//! 写请求：先删除所有受影响对象和主体的令牌，删除成功后才转发写请求，
//! 写成功后再用新令牌重新填充。这样被撤销权限的主体无法借助旧令牌
//! 继续通过检查（"New Enemy" 问题）。

pub mod cancel;
pub mod stream;

use crate::backend::{fan_out, unique_keys, TokenCache, DEFAULT_FAN_OUT};
use crate::config::{Config, DEFAULT_NAME};
use crate::error::{InterceptError, Result as CacheResult};
use crate::key;
use crate::metrics::GLOBAL_METRICS;
use crate::model::*;
use crate::service::{PermissionsService, ResponseStream};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tonic::Status;
use tracing::{debug, error, instrument};

pub use self::cancel::with_cancellation;
pub use self::stream::TokenCapturingStream;

/// 带令牌缓存的权限服务客户端
///
/// 注意：与上游默认的 `minimize_latency` 不同，未指定一致性的请求
/// 默认使用完全一致性。调用方显式设置的一致性要求不会被修改。
pub struct CachedPermissionsClient<S> {
    inner: S,
    cache: Arc<dyn TokenCache>,
    name: Arc<str>,
}

impl<S> CachedPermissionsClient<S>
where
    S: PermissionsService,
{
    /// 用给定的缓存包裹上游客户端
    pub fn new(inner: S, cache: Arc<dyn TokenCache>) -> Self {
        Self {
            inner,
            cache,
            name: Arc::from(DEFAULT_NAME),
        }
    }

    /// 根据配置创建缓存后端并包裹上游客户端
    pub async fn from_config(inner: S, config: &Config) -> CacheResult<Self> {
        let cache = config.build_cache().await?;
        Ok(Self::new(inner, cache).with_name(config.name.as_str()))
    }

    /// 设置服务名称，用于日志和指标
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<dyn TokenCache> {
        &self.cache
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// 补全一致性要求
    ///
    /// 调用方已设置要求时不做任何修改；否则默认完全一致性，
    /// 缓存命中时改为至少与缓存令牌一样新。缓存故障只记录日志。
    async fn apply_consistency(&self, consistency: &mut Option<Consistency>, key: Option<&str>) {
        let consistency = consistency.get_or_insert_with(Consistency::default);
        if consistency.requirement.is_some() {
            return;
        }
        consistency.requirement = Some(Requirement::FullyConsistent(true));

        let Some(key) = key else {
            return;
        };

        match self.cache.get(key).await {
            Ok(Some(token)) => {
                debug!(key, "zedtoken cache hit");
                GLOBAL_METRICS.record_request(&self.name, "lookup", "hit");
                consistency.requirement = Some(Requirement::AtLeastAsFresh(ZedToken { token }));
            }
            Ok(None) => {
                debug!(key, "zedtoken cache miss");
                GLOBAL_METRICS.record_request(&self.name, "lookup", "miss");
            }
            Err(err) => {
                error!(key, error = %err, "failed to read cache entry");
                GLOBAL_METRICS.record_request(&self.name, "lookup", "error");
            }
        }
    }

    /// 将响应中的令牌写入缓存，令牌缺失或为空时跳过
    async fn harvest(&self, key: &str, token: Option<&ZedToken>) {
        match token {
            Some(t) if !t.token.is_empty() => {
                store_token(self.cache.as_ref(), &self.name, key, &t.token).await;
            }
            _ => debug!(key, "response carries no zedtoken"),
        }
    }

    fn capture<T>(&self, stream: ResponseStream<T>, key: String) -> ResponseStream<T>
    where
        T: EvaluatedAt + Send + 'static,
    {
        Box::pin(TokenCapturingStream::new(
            stream,
            self.cache.clone(),
            key,
            self.name.clone(),
        ))
    }
}

/// 写入单个缓存项，失败只记录日志
pub(crate) async fn store_token(cache: &dyn TokenCache, service: &str, key: &str, token: &str) {
    match cache.set(key, token).await {
        Ok(()) => {
            debug!(key, "zedtoken cached");
            GLOBAL_METRICS.record_request(service, "store", "success");
        }
        Err(err) => {
            error!(service, key, error = %err, "failed to write cache entry");
            GLOBAL_METRICS.record_request(service, "store", "error");
        }
    }
}

/// 写请求影响的所有缓存键：每个更新的资源和主体，去重
///
/// # Panics
///
/// 更新中缺少关系、资源或主体时 panic。
pub fn invalidation_keys(updates: &[RelationshipUpdate]) -> Vec<String> {
    let mut keys = Vec::with_capacity(2 * updates.len());
    for update in updates {
        let relationship = update.relationship.as_ref();
        keys.push(key::object_key(
            relationship.and_then(|r| r.resource.as_ref()),
        ));
        keys.push(key::subject_key(
            relationship.and_then(|r| r.subject.as_ref()),
        ));
    }
    unique_keys(&keys)
}

#[async_trait]
impl<S> PermissionsService for CachedPermissionsClient<S>
where
    S: PermissionsService,
{
    #[instrument(skip(self, request), level = "debug", fields(service = %self.name))]
    async fn check_permission(
        &self,
        mut request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse, Status> {
        let key = key::object_key(request.resource.as_ref());
        self.apply_consistency(&mut request.consistency, Some(&key))
            .await;

        let response = self.inner.check_permission(request).await?;
        self.harvest(&key, response.evaluated_at()).await;
        Ok(response)
    }

    #[instrument(skip(self, request), level = "debug", fields(service = %self.name))]
    async fn expand_permission_tree(
        &self,
        mut request: ExpandPermissionTreeRequest,
    ) -> Result<ExpandPermissionTreeResponse, Status> {
        let key = key::object_key(request.resource.as_ref());
        self.apply_consistency(&mut request.consistency, Some(&key))
            .await;

        let response = self.inner.expand_permission_tree(request).await?;
        self.harvest(&key, response.evaluated_at()).await;
        Ok(response)
    }

    #[instrument(skip(self, request), level = "debug", fields(service = %self.name))]
    async fn read_relationships(
        &self,
        mut request: ReadRelationshipsRequest,
    ) -> Result<ResponseStream<ReadRelationshipsResponse>, Status> {
        // 没有资源 ID 时没有稳定的键，不读也不写缓存
        let key = request
            .relationship_filter
            .as_ref()
            .and_then(|f| key::filter_key(&f.resource_type, &f.optional_resource_id));
        self.apply_consistency(&mut request.consistency, key.as_deref())
            .await;

        let stream = self.inner.read_relationships(request).await?;
        Ok(match key {
            Some(key) => self.capture(stream, key),
            None => stream,
        })
    }

    #[instrument(skip(self, request), level = "debug", fields(service = %self.name))]
    async fn lookup_resources(
        &self,
        mut request: LookupResourcesRequest,
    ) -> Result<ResponseStream<LookupResourcesResponse>, Status> {
        let key = key::subject_key(request.subject.as_ref());
        self.apply_consistency(&mut request.consistency, Some(&key))
            .await;

        let stream = self.inner.lookup_resources(request).await?;
        Ok(self.capture(stream, key))
    }

    #[instrument(skip(self, request), level = "debug", fields(service = %self.name))]
    async fn lookup_subjects(
        &self,
        mut request: LookupSubjectsRequest,
    ) -> Result<ResponseStream<LookupSubjectsResponse>, Status> {
        let key = key::object_key(request.resource.as_ref());
        self.apply_consistency(&mut request.consistency, Some(&key))
            .await;

        let stream = self.inner.lookup_subjects(request).await?;
        Ok(self.capture(stream, key))
    }

    /// 写入关系
    ///
    /// 新令牌总是同时缓存到资源和主体上。增删资源时理想情况下只应缓存到
    /// 父资源，但无法从请求中区分"资源增删"和"关系增删"。
    #[instrument(
        skip(self, request),
        level = "debug",
        fields(service = %self.name, updates = request.updates.len())
    )]
    async fn write_relationships(
        &self,
        request: WriteRelationshipsRequest,
    ) -> Result<WriteRelationshipsResponse, Status> {
        let keys = invalidation_keys(&request.updates);

        let start = Instant::now();
        if let Err(err) = self.cache.delete(&keys).await {
            error!(error = %err, key_count = keys.len(), "failed to clear cache, write not forwarded");
            GLOBAL_METRICS.record_request(&self.name, "invalidate", "error");
            return Err(InterceptError::Invalidation(err).into());
        }
        GLOBAL_METRICS.record_request(&self.name, "invalidate", "success");
        GLOBAL_METRICS.record_duration(&self.name, "invalidate", start.elapsed().as_secs_f64());
        debug!(key_count = keys.len(), "cache entries cleared");

        let response = self.inner.write_relationships(request).await?;

        let written_at = response
            .evaluated_at()
            .map(|t| t.token.clone())
            .filter(|t| !t.is_empty());
        let Some(written_at) = written_at else {
            debug!("write response carries no zedtoken, skip repopulating");
            return Ok(response);
        };

        let cache = self.cache.as_ref();
        let token = written_at.as_str();
        let repopulated = fan_out(keys.iter().cloned(), DEFAULT_FAN_OUT, |key| async move {
            cache.set(&key, token).await
        })
        .await;
        match repopulated {
            Ok(()) => GLOBAL_METRICS.record_request(&self.name, "store", "success"),
            Err(err) => {
                error!(error = %err, "failed to write cache entry");
                GLOBAL_METRICS.record_request(&self.name, "store", "error");
            }
        }

        Ok(response)
    }
}
