//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::backend::TokenCache;
use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod tokens;

#[derive(Parser, Debug)]
#[command(name = "zedcache")]
#[command(author, version, about = "Inspect and manage cached zedtokens", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "get", about = "Print the cached zedtoken for a key")]
    Get { key: String },

    #[command(name = "set", about = "Store a zedtoken under a key")]
    Set { key: String, token: String },

    #[command(name = "invalidate", about = "Delete cached zedtokens")]
    Invalidate {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    #[command(name = "key", about = "Print the canonical cache key of a reference")]
    Key {
        #[arg(help = "Object type, e.g. document")]
        object_type: String,
        #[arg(help = "Object id")]
        object_id: String,
    },

    #[command(name = "validate", about = "Validate the configuration and connect to the backend")]
    Validate,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

pub async fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let output = execute(&cli.command, &config).await?;
    println!("{}", output);
    Ok(())
}

/// 执行命令并返回输出文本
pub async fn execute(command: &Commands, config: &Config) -> Result<String> {
    match command {
        Commands::Key {
            object_type,
            object_id,
        } => Ok(tokens::canonical_key(object_type, object_id)),
        Commands::Validate => {
            build_cache(config).await?;
            Ok(format!("✅ Configuration for '{}' is valid", config.name))
        }
        Commands::Get { key } => tokens::get(build_cache(config).await?.as_ref(), key).await,
        Commands::Set { key, token } => {
            tokens::set(build_cache(config).await?.as_ref(), key, token).await
        }
        Commands::Invalidate { keys } => {
            tokens::invalidate(build_cache(config).await?.as_ref(), keys).await
        }
    }
}

async fn build_cache(config: &Config) -> Result<Arc<dyn TokenCache>> {
    config
        .build_cache()
        .await
        .with_context(|| format!("Failed to initialize cache backend for '{}'", config.name))
}
