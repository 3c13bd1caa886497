//! HTTP process configuration, read once at startup.

use std::net::SocketAddr;

use docket_auth::Role;
use docket_infra::{ConfigError, InfraConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_AUTHORIZED_ROLE: &str = "operator";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Role allowed to call the job endpoints (`admin` always is).
    pub authorized_role: Role,
    pub infra: InfraConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                value: raw_addr.clone(),
                reason: e.to_string(),
            })?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let authorized_role =
            Role::new(var("AUTHORIZED_ROLE").unwrap_or_else(|| DEFAULT_AUTHORIZED_ROLE.to_string()));

        Ok(Self {
            bind_addr,
            jwt_secret,
            authorized_role,
            infra: InfraConfig::from_lookup(&lookup)?,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            authorized_role: Role::new(DEFAULT_AUTHORIZED_ROLE),
            infra: InfraConfig::default(),
        }
    }
}
