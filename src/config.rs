use anyhow::{Context, Result};
use clap::Parser;
use std::env;

use crate::services::chunk_codec::MAX_CHUNKS;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Chunk ceiling per object; the upload limit is this many chunks.
    pub max_chunks: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked PDF storage for scores and editions")]
pub struct Args {
    /// Host to bind to (overrides SCORE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SCORE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides SCORE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum chunks per object (overrides SCORE_STORE_MAX_CHUNKS)
    #[arg(long)]
    pub max_chunks: Option<usize>,

    /// Create tables and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        Self::merge(args)
    }

    fn merge(args: Args) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_host = env::var("SCORE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("SCORE_STORE_PORT", 3000u16)?;
        let env_db = env::var("SCORE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/score_store.db".into());
        let env_max_chunks = parse_env("SCORE_STORE_MAX_CHUNKS", MAX_CHUNKS)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_chunks: args.max_chunks.unwrap_or(env_max_chunks),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arguments_override_defaults() {
        let args = Args::parse_from([
            "score-store",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--database-url",
            "sqlite::memory:",
            "--max-chunks",
            "3",
            "--migrate",
        ]);
        let (cfg, migrate) = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.max_chunks, 3);
        assert!(migrate);
    }
}
