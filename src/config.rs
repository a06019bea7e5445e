use crate::services::chunk_store::DEFAULT_CHUNK_SIZE;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Default request body limit for uploads: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub chunk_size: usize,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Video hub API")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_HUB_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_HUB_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VIDEO_HUB_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Chunk size in bytes for stored videos (overrides VIDEO_HUB_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Largest accepted upload body in bytes (overrides VIDEO_HUB_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::resolve(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge CLI args over values from `lookup`, falling back to defaults.
    pub fn resolve(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_host = lookup("VIDEO_HUB_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_env(&lookup, "VIDEO_HUB_PORT", 8080u16)?;
        let env_db = lookup("VIDEO_HUB_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/hub.db".into());
        let env_chunk = parse_env(&lookup, "VIDEO_HUB_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let env_max_upload = parse_env(
            &lookup,
            "VIDEO_HUB_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            chunk_size: args.chunk_size.unwrap_or(env_chunk),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        if cfg.chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_env_or_args() {
        let (cfg, migrate) = AppConfig::resolve(Args::default(), env_of(&[])).unwrap();
        assert!(!migrate);
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.database_url, "sqlite://./data/hub.db");
        assert_eq!(cfg.chunk_size, 255 * 1024);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn args_override_env() {
        let env = env_of(&[("VIDEO_HUB_PORT", "9000"), ("VIDEO_HUB_CHUNK_SIZE", "1024")]);
        let args = Args {
            port: Some(7000),
            migrate: true,
            ..Args::default()
        };
        let (cfg, migrate) = AppConfig::resolve(args, env).unwrap();
        assert!(migrate);
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.chunk_size, 1024);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let bad_port = env_of(&[("VIDEO_HUB_PORT", "eighty")]);
        assert!(AppConfig::resolve(Args::default(), bad_port).is_err());

        let zero_chunk = env_of(&[("VIDEO_HUB_CHUNK_SIZE", "0")]);
        assert!(AppConfig::resolve(Args::default(), zero_chunk).is_err());
    }
}
