use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let jwt_secret = env::var("MESH_JWT_SECRET").unwrap_or_else(|_| {
            warn!("MESH_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            host: try_load("MESH_HOST", "0.0.0.0")?,
            port: try_load("MESH_PORT", "5100")?,
            db_path: try_load("MESH_DB_PATH", "meshspace.db")?,
            jwt_secret,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value '{raw}': {e}"))
}
