//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存的令牌缓存后端，使用 Moka 作为底层缓存库。

use super::{fan_out, TokenCache, DEFAULT_FAN_OUT};
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, instrument};

/// 进程内令牌缓存
///
/// 容量和过期时间是后端自己的策略，拦截器不关心。
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, String>,
}

impl MemoryCache {
    /// 创建新的内存缓存
    ///
    /// # 参数
    ///
    /// * `max_capacity` - 最大条目数，None表示不限制
    /// * `time_to_live` - 条目存活时间，None表示永不过期
    pub fn new(max_capacity: Option<u64>, time_to_live: Option<Duration>) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }

    /// 当前条目数（近似值）
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl TokenCache for MemoryCache {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.cache.get(key).await;
        debug!("memory get: key={}, found={}", key, value.is_some());
        Ok(value)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.cache.insert(key.to_string(), value.to_string()).await;
        debug!("memory set: key={}", key);
        Ok(())
    }

    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    async fn delete(&self, keys: &[String]) -> Result<()> {
        fan_out(keys.iter().cloned(), DEFAULT_FAN_OUT, |key| async move {
            self.cache.invalidate(&key).await;
            Ok(())
        })
        .await?;
        debug!("memory delete: {} keys removed", keys.len());
        Ok(())
    }
}
