//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 不保存任何内容的令牌缓存，所有查询都未命中。

use super::TokenCache;
use crate::error::Result;
use async_trait::async_trait;

/// 空缓存后端
///
/// 配合拦截器使用时，所有请求都会以完全一致性发送。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl TokenCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<()> {
        Ok(())
    }
}
