//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了令牌缓存的配置结构和解析逻辑。

use crate::backend::{MemoryCache, NoopCache, RedisCache, TokenCache};
use crate::error::{CacheError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 默认服务名称
pub const DEFAULT_NAME: &str = "zedcache";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// 服务名称，用于日志和指标
    #[serde(default = "default_name")]
    pub name: String,
    /// 缓存后端
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            backend: BackendConfig::default(),
        }
    }
}

/// 后端类型及其配置
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// 不缓存
    Noop,
    /// 进程内缓存
    Memory(MemoryConfig),
    /// Redis
    Redis(RedisConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory(MemoryConfig::default())
    }
}

/// 内存缓存配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct MemoryConfig {
    /// 最大条目数
    pub max_capacity: Option<u64>,
    /// 条目存活时间（秒）
    pub time_to_live_secs: Option<u64>,
}

/// Redis缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis模式
    pub mode: RedisMode,
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// Redis 密码（集群模式使用；单机模式请写在连接字符串中）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 集群配置
    pub cluster: Option<ClusterConfig>,
    /// 键前缀，仅在Redis内部使用
    pub key_prefix: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            mode: RedisMode::Standalone,
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            password: None,
            enable_tls: false,
            cluster: None,
            key_prefix: None,
        }
    }
}

/// 集群配置
#[derive(Deserialize, Clone, Debug)]
pub struct ClusterConfig {
    /// 初始节点列表
    pub nodes: Vec<String>,
}

/// Redis模式枚举
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    /// 单机模式
    #[default]
    Standalone,
    /// 集群模式
    Cluster,
}

impl Config {
    /// 从TOML字符串解析配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CacheError::Config(e.to_string()))
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() {
            return Err("Service name cannot be empty".to_string());
        }

        if self.name.len() > 64 {
            return Err(format!(
                "Service name '{}' exceeds maximum length of 64 characters",
                self.name
            ));
        }

        // 指标键以 ':' 分隔
        if self.name.contains(':') {
            return Err(format!("Service name '{}' cannot contain ':'", self.name));
        }

        match &self.backend {
            BackendConfig::Noop => {}
            BackendConfig::Memory(memory) => {
                if memory.max_capacity == Some(0) {
                    return Err("Memory max_capacity cannot be zero".to_string());
                }
                if memory.time_to_live_secs == Some(0) {
                    return Err("Memory time_to_live_secs cannot be zero".to_string());
                }
            }
            BackendConfig::Redis(redis) => {
                // 验证连接超时
                if !(100..=30000).contains(&redis.connection_timeout_ms) {
                    return Err(
                        "Redis connection_timeout_ms must be between 100 and 30000 ms".to_string(),
                    );
                }

                // 验证命令超时
                if !(100..=60000).contains(&redis.command_timeout_ms) {
                    return Err(
                        "Redis command_timeout_ms must be between 100 and 60000 ms".to_string(),
                    );
                }

                if redis.mode == RedisMode::Cluster {
                    match &redis.cluster {
                        Some(cluster) if !cluster.nodes.is_empty() => {}
                        _ => {
                            return Err("Redis cluster mode requires at least one node".to_string())
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// 根据配置创建缓存后端
    ///
    /// Redis后端会在此处建立连接。
    pub async fn build_cache(&self) -> Result<Arc<dyn TokenCache>> {
        self.validate().map_err(CacheError::Config)?;

        let cache: Arc<dyn TokenCache> = match &self.backend {
            BackendConfig::Noop => Arc::new(NoopCache),
            BackendConfig::Memory(memory) => Arc::new(MemoryCache::new(
                memory.max_capacity,
                memory.time_to_live_secs.map(Duration::from_secs),
            )),
            BackendConfig::Redis(redis) => Arc::new(RedisCache::connect(redis).await?),
        };
        Ok(cache)
    }
}
