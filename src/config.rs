//! Process configuration, read from environment variables (optionally loaded
//! from a `.env` file via `dotenvy`). There is one flat config struct rather
//! than per-component structs, matching how `commands/run.rs` reads its knobs
//! directly off `env::var` at startup.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub flush_interval: Duration,
    pub max_threshold: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub keep_days: i64,
    pub keep_months: i64,
}

#[derive(Debug, Clone)]
pub struct GeofenceConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub refresh_cache_seconds: u64,
    pub expire_cache_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct PokestopCountConfig {
    pub refresh_interval_seconds: u64,
    pub cache_expiry_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_pool_min: u32,
    pub db_pool_max: u32,
    pub db_connect_timeout_secs: u64,
    pub db_retry_connection: u32,
    pub db_retry_delay_secs: u64,

    pub redis_url: String,

    pub uvicorn_workers: u32,
    pub leader_lock_ttl_secs: u64,

    pub pokemon_iv: BufferConfig,
    pub shiny: BufferConfig,
    pub raids: BufferConfig,
    pub quests: BufferConfig,
    pub invasions: BufferConfig,

    pub clean_pokemon_iv: RetentionConfig,
    pub clean_raids: RetentionConfig,
    pub clean_quests: RetentionConfig,
    pub clean_invasions: RetentionConfig,
    pub clean_shiny: RetentionConfig,

    pub partition_ensure_interval_secs: u64,
    pub partition_days_back: i64,
    pub partition_days_forward: i64,
    pub partition_clean_interval_secs: u64,

    pub geofence: GeofenceConfig,
    pub pokestop_counts: PokestopCountConfig,

    pub listen_addr: String,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL must be set in environment variables")?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

        Ok(Self {
            database_url,
            db_pool_min: env_or("DB_POOL_MIN", 1),
            db_pool_max: env_or("DB_POOL_MAX", 10),
            db_connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SEC", 10),
            db_retry_connection: env_or("DB_RETRY_CONNECTION", 5),
            db_retry_delay_secs: env_or("DB_RETRY_DELAY_SEC", 5),

            redis_url,

            uvicorn_workers: env_or("UVICORN_WORKERS", 1),
            leader_lock_ttl_secs: env_or("LEADER_LOCK_TTL_SEC", 30),

            pokemon_iv: BufferConfig {
                flush_interval: Duration::from_secs(env_or("POKEMON_IV_FLUSH_INTERVAL", 60)),
                max_threshold: env_or("POKEMON_IV_MAX_THRESHOLD", 10_000),
                enabled: env_bool("STORE_SQL_POKEMON_IV_AGGREGATION", true),
            },
            shiny: BufferConfig {
                flush_interval: Duration::from_secs(env_or("SHINY_FLUSH_INTERVAL", 60)),
                max_threshold: env_or("SHINY_MAX_THRESHOLD", 10_000),
                enabled: env_bool("STORE_SQL_SHINY_AGGREGATION", true),
            },
            raids: BufferConfig {
                flush_interval: Duration::from_secs(env_or("RAIDS_FLUSH_INTERVAL", 60)),
                max_threshold: env_or("RAIDS_MAX_THRESHOLD", 2_000),
                enabled: env_bool("STORE_SQL_RAIDS_AGGREGATION", true),
            },
            quests: BufferConfig {
                flush_interval: Duration::from_secs(env_or("QUESTS_FLUSH_INTERVAL", 60)),
                max_threshold: env_or("QUESTS_MAX_THRESHOLD", 2_000),
                enabled: env_bool("STORE_SQL_QUESTS_AGGREGATION", true),
            },
            invasions: BufferConfig {
                flush_interval: Duration::from_secs(env_or("INVASIONS_FLUSH_INTERVAL", 60)),
                max_threshold: env_or("INVASIONS_MAX_THRESHOLD", 2_000),
                enabled: env_bool("STORE_SQL_INVASIONS_AGGREGATION", true),
            },

            clean_pokemon_iv: RetentionConfig {
                keep_days: env_or("CLEAN_POKEMON_IV_OLDER_THAN_X_DAYS", 7),
                keep_months: env_or("CLEAN_POKEMON_IV_OLDER_THAN_X_MONTHS", 12),
            },
            clean_raids: RetentionConfig {
                keep_days: env_or("CLEAN_RAIDS_OLDER_THAN_X_DAYS", 7),
                keep_months: env_or("CLEAN_RAIDS_OLDER_THAN_X_MONTHS", 12),
            },
            clean_quests: RetentionConfig {
                keep_days: env_or("CLEAN_QUESTS_OLDER_THAN_X_DAYS", 7),
                keep_months: env_or("CLEAN_QUESTS_OLDER_THAN_X_MONTHS", 12),
            },
            clean_invasions: RetentionConfig {
                keep_days: env_or("CLEAN_INVASIONS_OLDER_THAN_X_DAYS", 7),
                keep_months: env_or("CLEAN_INVASIONS_OLDER_THAN_X_MONTHS", 12),
            },
            clean_shiny: RetentionConfig {
                keep_days: env_or("CLEAN_SHINY_OLDER_THAN_X_DAYS", 7),
                keep_months: env_or("CLEAN_SHINY_OLDER_THAN_X_MONTHS", 12),
            },

            partition_ensure_interval_secs: env_or("PARTITION_ENSURE_INTERVAL_SEC", 86_400),
            partition_days_back: env_or("PARTITION_DAYS_BACK", 7),
            partition_days_forward: env_or("PARTITION_DAYS_FORWARD", 30),
            partition_clean_interval_secs: env_or("PARTITION_CLEAN_INTERVAL_SEC", 43_200),

            geofence: GeofenceConfig {
                api_url: env::var("GEOFENCE_API_URL").ok(),
                api_token: env::var("GEOFENCE_API_TOKEN").ok(),
                refresh_cache_seconds: env_or("GEOFENCE_REFRESH_CACHE_SECONDS", 300),
                expire_cache_seconds: env_or("GEOFENCE_EXPIRE_CACHE_SECONDS", 3_600),
            },
            pokestop_counts: PokestopCountConfig {
                refresh_interval_seconds: env_or("POKESTOP_REFRESH_INTERVAL_SECONDS", 300),
                cache_expiry_seconds: env_or("POKESTOP_CACHE_EXPIRY_SECONDS", 3_600),
            },

            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            metrics_port: env_or("METRICS_PORT", 9090),
        })
    }
}
