//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具：日志初始化、可编程的上游权限服务替身、
//! 以及用于注入故障的缓存 mock。

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use mockall::mock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tonic::Status;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use zedcache::model::*;
use zedcache::{PermissionsService, ResponseStream, TokenCache};

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 生成唯一的服务名称，避免全局指标在并行测试之间互相影响
pub fn generate_unique_service_name(base: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}_{}_{}",
        base,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// 测试用 Redis 地址，可通过 REDIS_URL 覆盖
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// 检查Redis是否可用
pub async fn is_redis_available() -> bool {
    let Ok(client) = redis::Client::open(redis_url()) else {
        return false;
    };
    let connect = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok::<_, redis::RedisError>(pong)
    };
    matches!(
        tokio::time::timeout(Duration::from_secs(2), connect).await,
        Ok(Ok(_))
    )
}

mock! {
    pub Cache {}

    #[async_trait]
    impl TokenCache for Cache {
        async fn get(&self, key: &str) -> zedcache::Result<Option<String>>;
        async fn set(&self, key: &str, value: &str) -> zedcache::Result<()>;
        async fn delete(&self, keys: &[String]) -> zedcache::Result<()>;
    }
}

pub fn post(id: &str) -> ObjectReference {
    ObjectReference::new("post", id)
}

pub fn user(id: &str) -> SubjectReference {
    SubjectReference::new("user", id)
}

pub fn check_request(resource: ObjectReference, subject: SubjectReference) -> CheckPermissionRequest {
    CheckPermissionRequest {
        consistency: None,
        resource: Some(resource),
        permission: "read".to_string(),
        subject: Some(subject),
    }
}

pub fn lookup_resources_request(subject: SubjectReference) -> LookupResourcesRequest {
    LookupResourcesRequest {
        consistency: None,
        resource_object_type: "post".to_string(),
        permission: "read".to_string(),
        subject: Some(subject),
        optional_limit: 0,
    }
}

pub fn write_request(updates: Vec<(ObjectReference, &str, SubjectReference)>) -> WriteRelationshipsRequest {
    WriteRelationshipsRequest {
        updates: updates
            .into_iter()
            .map(|(resource, relation, subject)| {
                RelationshipUpdate::new(
                    Operation::Touch,
                    Relationship::new(resource, relation, subject),
                )
            })
            .collect(),
        optional_preconditions: Vec::new(),
    }
}

/// 上游权限服务替身
///
/// 记录收到的每个请求；读响应携带 `read_token`，写响应携带 `write_token`。
#[derive(Default)]
pub struct FakePermissionsService {
    pub read_token: Mutex<Option<String>>,
    pub write_token: Mutex<Option<String>>,
    /// 流式响应的消息条数
    pub stream_len: Mutex<usize>,
    /// 设置后所有调用都返回这个错误码
    pub fail_with: Mutex<Option<tonic::Code>>,
    /// 写请求永不完成
    pub block_writes: AtomicBool,
    /// 写请求到达时，读取这些键在缓存中的当前值
    pub observe_on_write: Mutex<Option<(Arc<dyn TokenCache>, Vec<String>)>>,
    pub observed: Mutex<Vec<(String, Option<String>)>>,

    pub check_requests: Mutex<Vec<CheckPermissionRequest>>,
    pub expand_requests: Mutex<Vec<ExpandPermissionTreeRequest>>,
    pub read_requests: Mutex<Vec<ReadRelationshipsRequest>>,
    pub lookup_resources_requests: Mutex<Vec<LookupResourcesRequest>>,
    pub lookup_subjects_requests: Mutex<Vec<LookupSubjectsRequest>>,
    pub write_requests: Mutex<Vec<WriteRelationshipsRequest>>,
}

impl FakePermissionsService {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.stream_len.lock().unwrap() = 3;
        Arc::new(fake)
    }

    pub fn set_read_token(&self, token: Option<&str>) {
        *self.read_token.lock().unwrap() = token.map(str::to_string);
    }

    pub fn set_write_token(&self, token: Option<&str>) {
        *self.write_token.lock().unwrap() = token.map(str::to_string);
    }

    pub fn fail_with(&self, code: Option<tonic::Code>) {
        *self.fail_with.lock().unwrap() = code;
    }

    pub fn observe_on_write(&self, cache: Arc<dyn TokenCache>, keys: &[&str]) {
        *self.observe_on_write.lock().unwrap() =
            Some((cache, keys.iter().map(|k| k.to_string()).collect()));
    }

    fn check_failure(&self) -> Result<(), Status> {
        match *self.fail_with.lock().unwrap() {
            Some(code) => Err(Status::new(code, "upstream failure")),
            None => Ok(()),
        }
    }

    fn token(&self) -> Option<ZedToken> {
        self.read_token.lock().unwrap().clone().map(ZedToken::new)
    }

    fn stream_of<T, F>(&self, make: F) -> ResponseStream<T>
    where
        T: Send + 'static,
        F: Fn(usize, Option<ZedToken>) -> T,
    {
        let token = self.token();
        let len = *self.stream_len.lock().unwrap();
        let items: Vec<Result<T, Status>> = (0..len).map(|i| Ok(make(i, token.clone()))).collect();
        Box::pin(stream::iter(items))
    }

    /// 最近一次 check 请求中的一致性要求
    pub fn last_check_requirement(&self) -> Option<Requirement> {
        self.check_requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.consistency.clone())
            .and_then(|c| c.requirement)
    }

    pub fn write_count(&self) -> usize {
        self.write_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PermissionsService for FakePermissionsService {
    async fn check_permission(
        &self,
        request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse, Status> {
        self.check_requests.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(CheckPermissionResponse {
            checked_at: self.token(),
            permissionship: Permissionship::HasPermission,
        })
    }

    async fn expand_permission_tree(
        &self,
        request: ExpandPermissionTreeRequest,
    ) -> Result<ExpandPermissionTreeResponse, Status> {
        let root = PermissionRelationshipTree {
            expanded_object: request.resource.clone(),
            expanded_relation: request.permission.clone(),
            ..Default::default()
        };
        self.expand_requests.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(ExpandPermissionTreeResponse {
            expanded_at: self.token(),
            tree_root: Some(root),
        })
    }

    async fn read_relationships(
        &self,
        request: ReadRelationshipsRequest,
    ) -> Result<ResponseStream<ReadRelationshipsResponse>, Status> {
        let resource_type = request
            .relationship_filter
            .as_ref()
            .map(|f| f.resource_type.clone())
            .unwrap_or_default();
        self.read_requests.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.stream_of(move |i, token| ReadRelationshipsResponse {
            read_at: token,
            relationship: Some(Relationship::new(
                ObjectReference::new(resource_type.clone(), i.to_string()),
                "owner",
                SubjectReference::new("user", "1"),
            )),
        }))
    }

    async fn lookup_resources(
        &self,
        request: LookupResourcesRequest,
    ) -> Result<ResponseStream<LookupResourcesResponse>, Status> {
        self.lookup_resources_requests.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.stream_of(|i, token| LookupResourcesResponse {
            looked_up_at: token,
            resource_object_id: i.to_string(),
            permissionship: Permissionship::HasPermission,
        }))
    }

    async fn lookup_subjects(
        &self,
        request: LookupSubjectsRequest,
    ) -> Result<ResponseStream<LookupSubjectsResponse>, Status> {
        self.lookup_subjects_requests.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.stream_of(|i, token| LookupSubjectsResponse {
            looked_up_at: token,
            subject: Some(ResolvedSubject {
                subject_object_id: i.to_string(),
                permissionship: Permissionship::HasPermission,
            }),
        }))
    }

    async fn write_relationships(
        &self,
        request: WriteRelationshipsRequest,
    ) -> Result<WriteRelationshipsResponse, Status> {
        let observe = self.observe_on_write.lock().unwrap().clone();
        if let Some((cache, keys)) = observe {
            for key in keys {
                let value = cache.get(&key).await.expect("observing cache should succeed");
                self.observed.lock().unwrap().push((key, value));
            }
        }

        self.write_requests.lock().unwrap().push(request);
        if self.block_writes.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.check_failure()?;
        Ok(WriteRelationshipsResponse {
            written_at: self.write_token.lock().unwrap().clone().map(ZedToken::new),
        })
    }
}
