//! Environment-driven configuration, read once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub upload_root: PathBuf,
    pub max_db_connections: u32,
}

impl ServerConfig {
    /// `DATABASE_URL` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = std::env::var("OPSDESK_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4200".to_string())
            .parse()
            .context("OPSDESK_BIND_ADDR is not a valid socket address")?;
        let upload_root = std::env::var("OPSDESK_UPLOAD_ROOT")
            .unwrap_or_else(|_| "uploads".to_string())
            .into();
        let max_db_connections = std::env::var("OPSDESK_MAX_DB_CONNECTIONS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("OPSDESK_MAX_DB_CONNECTIONS is not a number")?
            .unwrap_or(10);
        Ok(Self {
            database_url,
            bind_addr,
            upload_root,
            max_db_connections,
        })
    }
}
