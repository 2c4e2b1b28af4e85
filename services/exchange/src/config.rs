//! Environment-variable configuration

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (`EXCHANGE_BIND`)
    pub bind_addr: SocketAddr,
    /// Journal directory; unset means an ephemeral store (`EXCHANGE_DATA_DIR`)
    pub data_dir: Option<PathBuf>,
    /// Token required on /admin endpoints (`EXCHANGE_ADMIN_TOKEN`)
    pub admin_token: String,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("EXCHANGE_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
        let data_dir = std::env::var("EXCHANGE_DATA_DIR").ok().map(PathBuf::from);
        let admin_token =
            std::env::var("EXCHANGE_ADMIN_TOKEN").unwrap_or_else(|_| "admin-dev-token".to_string());

        Self {
            bind_addr,
            data_dir,
            admin_token,
        }
    }
}
