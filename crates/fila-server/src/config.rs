use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets shipped in sample `.env` files. Refused at start-up.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub staff_key: String,
    pub default_wait_minutes: i64,
    pub seed_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("FILA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FILA_JWT_SECRET is unset or still a placeholder");
        }

        let staff_key = lookup("FILA_STAFF_KEY").unwrap_or_default();
        if staff_key.is_empty() || PLACEHOLDER_SECRETS.contains(&staff_key.as_str()) {
            bail!("FILA_STAFF_KEY is unset or still a placeholder");
        }

        let host = lookup("FILA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("FILA_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("FILA_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let default_wait_minutes: i64 = match lookup("FILA_DEFAULT_WAIT_MINUTES") {
            Some(v) => v.parse().context("FILA_DEFAULT_WAIT_MINUTES must be a number")?,
            None => 15,
        };
        if default_wait_minutes < 0 {
            bail!("FILA_DEFAULT_WAIT_MINUTES must not be negative");
        }

        Ok(Self {
            addr,
            db_path: lookup("FILA_DB_PATH").unwrap_or_else(|| "fila.db".into()).into(),
            jwt_secret,
            staff_key,
            default_wait_minutes,
            seed_path: lookup("FILA_SEED_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
        })
    }
}
