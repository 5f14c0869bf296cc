use envconfig::Envconfig;
use serde::{Deserialize, Serialize};

#[derive(Envconfig, Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL", default = "postgresql://localhost/marketplace")]
    pub database_url: String,

    #[envconfig(from = "MARKET_DB_MAX_CONNECTIONS", default = "10")]
    pub db_max_connections: u32,

    #[envconfig(from = "MARKET_DB_ACQUIRE_TIMEOUT_SECONDS", default = "30")]
    pub db_acquire_timeout_seconds: u64,

    #[envconfig(from = "MARKET_FANOUT_CONCURRENCY", default = "8")]
    pub fanout_concurrency: usize,

    #[envconfig(from = "RUST_LOG", default = "info")]
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }
}
