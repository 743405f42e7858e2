//! zedcache - 权限服务 ZedToken 缓存
//!
//! 包裹 SpiceDB / Authzed 权限服务客户端，为每个访问过的对象或主体
//! 记住服务端最近返回的 ZedToken，后续请求以"至少与令牌一样新"代替
//! 完全一致性；写入关系前先清除相关令牌，避免 "New Enemy" 问题。

#![doc(html_root_url = "https://docs.rs/zedcache/0.1.0")]

pub use tokio;

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod key;
pub mod metrics;
pub mod model;
pub mod service;

// Re-export commonly used items
pub use backend::{MemoryCache, NoopCache, RedisCache, TokenCache};
pub use config::Config;
pub use error::{CacheError, InterceptError, Result};
pub use interceptor::{with_cancellation, CachedPermissionsClient, TokenCapturingStream};
pub use service::{PermissionsService, ResponseStream};

/// zedcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
