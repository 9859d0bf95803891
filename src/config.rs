use std::env;

use thiserror::Error;

use crate::client::DEFAULT_MAX_CLIENTS;

/// Default listen address of the BFF.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Principal granted the admin role in the in-memory backend.
pub const DEFAULT_LOCAL_ADMIN: &str = "local-admin";

/// ConfigError
///
/// Raised by `AppConfig::load`. Fatal at process start, never afterwards.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingVar(&'static str),
    #[error("{name} is set but empty")]
    EmptyVar { name: &'static str },
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

/// AppConfig
///
/// Immutable process configuration, read once at start-up and kept on `AppState`.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and whether a remote service is required.
    pub env: Env,
    // Base URL of the remote data service. `None` runs against the in-memory backend.
    pub service_url: Option<String>,
    pub bind_addr: String,
    // Seeded as admin when the in-memory backend is in use.
    pub local_admin: String,
    // Most caller clients (and their caches) kept alive at once.
    pub max_clients: usize,
}

/// Env
///
/// Local runs log human-readable output and may skip the remote service; production logs
/// JSON and must name one.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Local configuration on the in-memory backend, for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            service_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            local_admin: DEFAULT_LOCAL_ADMIN.to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment (after `.env` has been loaded).
    ///
    /// - `APP_ENV`: `production` or anything else for local.
    /// - `SERVICE_URL`: required in production.
    /// - `BIND_ADDR`: defaults to `0.0.0.0:3000`.
    /// - `LOCAL_ADMIN_PRINCIPAL`: defaults to `local-admin`.
    /// - `MAX_CACHED_CLIENTS`: defaults to 1024.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let service_url = match (optional_var("SERVICE_URL")?, &env) {
            (None, Env::Production) => return Err(ConfigError::MissingVar("SERVICE_URL")),
            (url, _) => url,
        };

        Ok(Self {
            env,
            service_url,
            bind_addr: optional_var("BIND_ADDR")?.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            local_admin: optional_var("LOCAL_ADMIN_PRINCIPAL")?
                .unwrap_or_else(|| DEFAULT_LOCAL_ADMIN.to_string()),
            max_clients: match optional_var("MAX_CACHED_CLIENTS")? {
                Some(value) => match value.parse::<usize>() {
                    Ok(count) if count > 0 => count,
                    _ => {
                        return Err(ConfigError::InvalidVar {
                            name: "MAX_CACHED_CLIENTS",
                            value,
                        });
                    }
                },
                None => DEFAULT_MAX_CLIENTS,
            },
        })
    }
}

/// Unset is fine; set-but-blank is a mistake worth refusing to start over.
fn optional_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar { name }),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(_) => Ok(None),
    }
}
