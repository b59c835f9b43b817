use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::memory_db::TableNames;

#[derive(Debug, Clone)]
pub struct Config {
    pub store_region: String,
    pub database_path: PathBuf,
    pub tables: TableNames,
    pub db_pool_size: u32,
    pub db_pool_max_lifetime: Duration,
    pub db_pool_idle_timeout: Duration,
    pub inference_api_key: String,
    pub inference_model: String,
    pub inference_base_url: String,
    pub inference_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub api_host: String,
    pub api_port: u16,
    pub environment: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    /// Load `.env` into the process environment; returns whether a file was found
    pub fn load_dotenv() -> bool {
        dotenvy::dotenv().is_ok()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let inference_api_key = lookup("GROQ_API_KEY")
            .or_else(|| lookup("INFERENCE_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .context("GROQ_API_KEY not found. Please set it in your .env file")?;

        let store_region = lookup("STORE_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .unwrap_or_else(|| "eu-north-1".into());

        let tables = TableNames::new(
            get("DDB_TABLE_CONVERSATIONS", "wellness_conversation"),
            get("DDB_TABLE_PROFILES", "wellness_profile"),
        )?;

        let cors_origins: Vec<String> = get("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if cors_origins.is_empty() {
            warn!("CORS_ORIGINS is empty; cross-origin requests will be rejected");
        }

        Ok(Self {
            store_region,
            database_path: PathBuf::from(get("DATABASE_PATH", "./data/wellness.db")),
            tables,
            db_pool_size: parse_var(&lookup, "DB_POOL_SIZE", "10")?,
            db_pool_max_lifetime: Duration::from_secs(parse_var(&lookup, "DB_POOL_MAX_LIFETIME_SECONDS", "1800")?),
            db_pool_idle_timeout: Duration::from_secs(parse_var(&lookup, "DB_POOL_IDLE_TIMEOUT_SECONDS", "300")?),
            inference_api_key,
            inference_model: get("INFERENCE_MODEL", "llama-3.3-70b-versatile"),
            inference_base_url: get("INFERENCE_BASE_URL", "https://api.groq.com/openai"),
            inference_timeout: Duration::from_secs(parse_var(&lookup, "INFERENCE_TIMEOUT_SECONDS", "60")?),
            cors_origins,
            api_host: get("API_HOST", "0.0.0.0"),
            api_port: parse_var(&lookup, "PORT", "8000")?,
            environment: get("ENVIRONMENT", "production"),
            rate_limit_requests: parse_var(&lookup, "RATE_LIMIT_REQUESTS", "50")?,
            rate_limit_window: Duration::from_secs(parse_var(&lookup, "RATE_LIMIT_WINDOW_SECONDS", "60")?),
        })
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn default_log_filter(environment: &str) -> &'static str {
        if environment.eq_ignore_ascii_case("development") {
            "debug"
        } else {
            "info"
        }
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Environment: {}", self.environment);
        info!("- Database: {} (region tag {})", self.database_path.display(), self.store_region);
        info!("- Tables: {} / {}", self.tables.conversations, self.tables.profiles);
        info!(
            "- Pool: {} connections, lifetime {}s, idle timeout {}s",
            self.db_pool_size,
            self.db_pool_max_lifetime.as_secs(),
            self.db_pool_idle_timeout.as_secs()
        );
        info!("- Inference: {} at {}", self.inference_model, self.inference_base_url);
        info!("- Inference API key: {}", mask_secret(&self.inference_api_key));
        info!("- Inference timeout: {}s", self.inference_timeout.as_secs());
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- CORS origins: {}", self.cors_origins.join(", "));
        info!(
            "- Rate limit: {} requests per {}s",
            self.rate_limit_requests,
            self.rate_limit_window.as_secs()
        );
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
