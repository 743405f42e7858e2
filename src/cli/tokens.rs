//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 令牌查看、写入和失效命令的实现。

use crate::backend::TokenCache;
use crate::key;
use crate::model::ObjectReference;
use anyhow::{Context, Result};

pub(super) fn canonical_key(object_type: &str, object_id: &str) -> String {
    key::object_key(Some(&ObjectReference::new(object_type, object_id)))
}

pub(super) async fn get(cache: &dyn TokenCache, key: &str) -> Result<String> {
    let token = cache
        .get(key)
        .await
        .with_context(|| format!("Failed to read key '{}'", key))?;
    Ok(token.unwrap_or_else(|| "(miss)".to_string()))
}

pub(super) async fn set(cache: &dyn TokenCache, key: &str, token: &str) -> Result<String> {
    cache
        .set(key, token)
        .await
        .with_context(|| format!("Failed to write key '{}'", key))?;
    Ok(format!("{} = {}", key, token))
}

pub(super) async fn invalidate(cache: &dyn TokenCache, keys: &[String]) -> Result<String> {
    cache
        .delete(keys)
        .await
        .context("Failed to invalidate cached zedtokens")?;
    Ok(format!("✅ Invalidated {} key(s)", keys.len()))
}
