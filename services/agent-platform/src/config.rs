//! Environment-variable configuration

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (`PLATFORM_BIND`)
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("PLATFORM_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8001)));
        Self { bind_addr }
    }
}
