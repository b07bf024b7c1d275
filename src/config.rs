use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// Path of the SQLite database backing the row store.
    pub database_path: String,
    /// Origin prefixed to shareable survey links.
    pub public_origin: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("ENCUESTA_PORT", "8080"),
            database_path: try_load("ENCUESTA_DB", "encuesta.sqlite3"),
            public_origin: try_load("ENCUESTA_ORIGIN", "http://localhost:8080"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
