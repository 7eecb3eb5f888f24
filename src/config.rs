// src/config.rs
use crate::error::AppResult;
use std::{env, net::SocketAddr};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILTER: &str =
    "lrc_database=debug,tower_http=info,sqlx=warn,tower_sessions=info";

/// Runtime settings read from the environment (and `.env`, via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session_expiry_hours: i64,
}

impl Config {
    pub fn from_env() -> AppResult<Config> {
        dotenvy::dotenv().ok(); // Loads .env when present

        let database_url = env::var("DATABASE_URL")?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Invalid BIND_ADDR ({}), using {}", e, DEFAULT_BIND_ADDR);
                SocketAddr::from(([0, 0, 0, 0], 3000))
            });

        let session_expiry_hours = env::var("SESSION_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);

        Ok(Config {
            database_url,
            bind_addr,
            session_expiry_hours,
        })
    }
}
