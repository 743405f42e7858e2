//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的令牌缓存后端，支持单机和集群模式。

use super::{fan_out, unique_keys, TokenCache, DEFAULT_FAN_OUT};
use crate::config::{RedisConfig, RedisMode};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, cluster_async::ClusterConnection, Client, FromRedisValue};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

#[derive(Clone)]
enum Connection {
    Standalone(ConnectionManager),
    Cluster(ClusterConnection),
}

/// Redis令牌缓存
///
/// 令牌不设置过期时间；需要过期策略时在Redis侧配置 maxmemory-policy。
#[derive(Clone)]
pub struct RedisCache {
    conn: Connection,
    command_timeout_ms: u64,
    key_prefix: Option<String>,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.conn {
            Connection::Standalone(_) => write!(f, "RedisCache::Standalone"),
            Connection::Cluster(_) => write!(f, "RedisCache::Cluster"),
        }
    }
}

impl RedisCache {
    /// 根据配置连接Redis
    ///
    /// # 参数
    ///
    /// * `config` - Redis后端配置
    ///
    /// # 返回值
    ///
    /// 返回新的RedisCache实例或错误
    #[instrument(skip(config), level = "info", name = "init_redis_cache", fields(mode = ?config.mode))]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let conn = match config.mode {
            RedisMode::Standalone => Connection::Standalone(connect_standalone(config).await?),
            RedisMode::Cluster => Connection::Cluster(connect_cluster(config).await?),
        };
        info!("Redis token cache connected");
        Ok(Self {
            conn,
            command_timeout_ms: config.command_timeout_ms,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 使用已有的连接管理器创建实例
    pub fn from_connection_manager(
        manager: ConnectionManager,
        command_timeout_ms: u64,
        key_prefix: Option<String>,
    ) -> Self {
        Self {
            conn: Connection::Standalone(manager),
            command_timeout_ms,
            key_prefix,
        }
    }

    /// 检查连接是否正常
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        let response: String = self.query(redis::cmd("PING")).await?;
        debug!("RedisCache ping: {}", response);
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T> {
        let fut = async {
            match &self.conn {
                Connection::Standalone(manager) => {
                    let mut conn = manager.clone();
                    cmd.query_async(&mut conn).await
                }
                Connection::Cluster(cluster) => {
                    let mut conn = cluster.clone();
                    cmd.query_async(&mut conn).await
                }
            }
        };

        match timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => res.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(format!(
                "Redis command timed out after {}ms",
                self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl TokenCache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(self.full_key(key));
        let value: Option<String> = self.query(cmd).await?;
        debug!("redis get: key={}, found={}", key, value.is_some());
        Ok(value)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.full_key(key)).arg(value);
        self.query::<()>(cmd).await
    }

    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    async fn delete(&self, keys: &[String]) -> Result<()> {
        let keys: Vec<String> = unique_keys(keys)
            .iter()
            .map(|k| self.full_key(k))
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        match self.conn {
            // 单机模式下一条 DEL 原子删除所有键
            Connection::Standalone(_) => {
                let mut cmd = redis::cmd("DEL");
                cmd.arg(&keys);
                let removed: i64 = self.query(cmd).await?;
                debug!("redis delete: requested={}, removed={}", keys.len(), removed);
                Ok(())
            }
            // 集群模式下键可能落在不同的槽，逐个删除并汇总错误
            Connection::Cluster(_) => {
                fan_out(keys, DEFAULT_FAN_OUT, |key| async move {
                    let mut cmd = redis::cmd("DEL");
                    cmd.arg(&key);
                    self.query::<i64>(cmd).await.map(|_| ())
                })
                .await
            }
        }
    }
}

async fn connect_standalone(config: &RedisConfig) -> Result<ConnectionManager> {
    let connection_string_secret = &config.connection_string;
    let connection_string = if config.enable_tls
        && !connection_string_secret
            .expose_secret()
            .starts_with("rediss://")
    {
        connection_string_secret
            .expose_secret()
            .replace("redis://", "rediss://")
    } else {
        connection_string_secret.expose_secret().to_string()
    };

    let client = Client::open(connection_string.as_str())?;
    match timeout(
        Duration::from_millis(config.connection_timeout_ms),
        client.get_connection_manager(),
    )
    .await
    {
        Ok(res) => Ok(res?),
        Err(_) => Err(CacheError::Timeout(format!(
            "Connection timed out after {}ms",
            config.connection_timeout_ms
        ))),
    }
}

async fn connect_cluster(config: &RedisConfig) -> Result<ClusterConnection> {
    let cluster_config = config
        .cluster
        .as_ref()
        .ok_or_else(|| CacheError::Config("Cluster configuration is missing".to_string()))?;

    let mut builder = redis::cluster::ClusterClient::builder(cluster_config.nodes.clone());
    if let Some(password) = &config.password {
        builder = builder.password(password.expose_secret().to_string());
    }
    // 不从副本读取：副本可能尚未应用写入前的删除
    let client = builder.build()?;

    let conn = timeout(
        Duration::from_millis(config.connection_timeout_ms),
        client.get_async_connection(),
    )
    .await
    .map_err(|_| {
        CacheError::Timeout(format!(
            "Cluster connection timed out after {}ms",
            config.connection_timeout_ms
        ))
    })??;
    Ok(conn)
}
