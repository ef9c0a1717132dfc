use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub ladder: LadderConfig,
    pub gateway: GatewayConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the ladder keeps its state in memory only
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
    /// Single origin allowed by CORS; any origin when unset
    pub cors_origin: Option<String>,
}

/// Tunables of the ladder rules
#[derive(Debug, Deserialize, Clone)]
pub struct LadderConfig {
    pub starting_tokens: i64,
    /// Waiting queue entries older than this are expired by the sweep
    pub queue_max_age_secs: i64,
    pub sweep_interval_secs: u64,
    pub maps_per_match: usize,
    pub highlight_price: i64,
    pub highlight_days: i64,
    pub taunt_price: i64,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            starting_tokens: 100,
            queue_max_age_secs: 3600,
            sweep_interval_secs: 60,
            maps_per_match: 3,
            highlight_price: 50,
            highlight_days: 7,
            taunt_price: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Chat bot gateway receiving notifications, thread and role requests
    pub url: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    /// Required in the `X-Admin-Token` header of admin endpoints; admin endpoints are disabled when unset
    pub token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok();
        let db_max_connections: u32 = parse_or("DATABASE_MAX_CONNECTIONS", 5)?;
        let port: u16 = parse_or("PORT", 8080)?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let cors_origin = env::var("CORS_ALLOWED_ORIGIN").ok().filter(|o| !o.is_empty());

        let defaults = LadderConfig::default();
        let ladder = LadderConfig {
            starting_tokens: parse_or("STARTING_TOKENS", defaults.starting_tokens)?,
            queue_max_age_secs: parse_or("QUEUE_MAX_AGE_SECS", defaults.queue_max_age_secs)?,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            maps_per_match: parse_or("MAPS_PER_MATCH", defaults.maps_per_match)?,
            highlight_price: parse_or("HIGHLIGHT_PRICE", defaults.highlight_price)?,
            highlight_days: parse_or("HIGHLIGHT_DAYS", defaults.highlight_days)?,
            taunt_price: parse_or("TAUNT_PRICE", defaults.taunt_price)?,
        };
        if ladder.starting_tokens < 0 {
            anyhow::bail!("STARTING_TOKENS must not be negative");
        }
        if ladder.sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }

        let gateway_url = env::var("BOT_GATEWAY_URL").ok();
        let gateway_max_retries: u32 = parse_or("BOT_GATEWAY_MAX_RETRIES", 3)?;
        let gateway_timeout_secs: u64 = parse_or("BOT_GATEWAY_TIMEOUT_SECS", 10)?;
        let admin_token = env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections: db_max_connections,
            },
            server: ServerConfig {
                port,
                host,
                rust_log,
                cors_origin,
            },
            ladder,
            gateway: GatewayConfig {
                url: gateway_url,
                max_retries: gateway_max_retries,
                timeout_secs: gateway_timeout_secs,
            },
            admin: AdminConfig { token: admin_token },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
