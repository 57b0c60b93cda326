//! Environment-based configuration for the server binary.

use std::time::Duration;

use anyhow::Context;

use mailspool_infra::mailer::SmtpConfig;
use mailspool_infra::PoolConfig;

/// Full process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub smtp: SmtpConfig,
    pub pool: PoolConfig,
    /// How long shutdown waits for workers before abandoning in-flight work.
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:8080");
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            tracing::warn!("DATABASE_URL not set; using sqlite:mailspool.db");
            "sqlite:mailspool.db?mode=rwc".to_string()
        });

        let smtp = SmtpConfig {
            host: require_env("SMTP_HOST")?,
            port: parse_env("SMTP_PORT", 25)?,
            username: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASS").ok(),
            from: require_env("SMTP_FROM")?,
        };

        let pool = PoolConfig {
            worker_count: parse_env("WORKER_COUNT", 3)?,
            poll_interval: Duration::from_millis(parse_env("POLL_INTERVAL_MS", 2000)?),
            batch_size: parse_env("BATCH_SIZE", 10)?,
            max_retries: parse_env("MAX_RETRIES", 3)?,
        };

        Ok(Self {
            bind_addr,
            database_url,
            smtp,
            pool,
            shutdown_grace: Duration::from_secs(10),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing env var: {key}"))
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
