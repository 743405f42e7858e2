//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了令牌缓存和拦截器的错误类型。

use std::sync::Arc;
use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 注意：缓存未命中不是错误，查询接口通过 `Ok(None)` 表示未命中。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 后端错误
    #[error("Backend error: {0}")]
    Backend(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 批量操作中的多个失败，全部保留
    #[error("{} cache operation(s) failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<CacheError>),
}

impl CacheError {
    /// 将一组错误合并为单个错误
    ///
    /// 没有错误时返回 `None`，只有一个错误时原样返回。
    pub fn aggregate(mut errors: Vec<CacheError>) -> Option<CacheError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(CacheError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[CacheError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 缓存操作结果类型别名
pub type Result<T> = std::result::Result<T, CacheError>;

/// 拦截器自身产生的错误
///
/// 上游 RPC 错误不会被包装，直接返回给调用方。
#[derive(Error, Debug)]
pub enum InterceptError {
    /// 写入前清理缓存失败，写请求没有被转发
    #[error("failed to clear cache: {0}")]
    Invalidation(#[source] CacheError),
}

impl From<InterceptError> for tonic::Status {
    fn from(err: InterceptError) -> Self {
        let mut status = tonic::Status::unavailable(err.to_string());
        status.set_source(Arc::new(err));
        status
    }
}
