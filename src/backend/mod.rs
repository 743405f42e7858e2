//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了令牌缓存的抽象接口以及各个后端实现。

pub mod memory;
pub mod noop;
pub mod redis;

use crate::error::{CacheError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;

pub use self::memory::MemoryCache;
pub use self::noop::NoopCache;
pub use self::redis::RedisCache;

/// 单次批量操作中同时进行的最大后端请求数
pub const DEFAULT_FAN_OUT: usize = 16;

/// 令牌缓存接口
///
/// 键和值都是不透明字符串。实现必须支持并发调用。
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// 查询缓存值
    ///
    /// # 返回值
    ///
    /// 命中返回 `Ok(Some(value))`，未命中返回 `Ok(None)`，
    /// 后端故障返回错误。
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 无条件写入，覆盖旧值
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除所有给定的键
    ///
    /// 只有在每个键的删除都已在后端生效后才返回。删除不存在的键不是错误。
    /// 多个键删除失败时，所有失败都必须通过 [`CacheError::Multiple`] 返回，
    /// 否则写入路径无法判断失效是否完整，可能导致撤销权限的主体
    /// 借助旧令牌继续访问（"New Enemy" 问题）。
    async fn delete(&self, keys: &[String]) -> Result<()>;
}

/// 对每个键并发执行操作，等待全部完成后汇总错误
///
/// 并发度受 `limit` 限制；函数返回时不会留下任何未完成的任务。
pub async fn fan_out<I, F, Fut>(keys: I, limit: usize, op: F) -> Result<()>
where
    I: IntoIterator<Item = String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let errors: Vec<CacheError> = stream::iter(keys)
        .map(op)
        .buffer_unordered(limit.max(1))
        .filter_map(|res| async move { res.err() })
        .collect()
        .await;

    match CacheError::aggregate(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// 去重并保持首次出现的顺序
pub fn unique_keys<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for key in keys {
        if seen.insert(key.as_str()) {
            unique.push(key.clone());
        }
    }
    unique
}
