//! Configuration loading and representation.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `MAINTOPS_STORE` | `memory` or `postgres` | `memory` |
//! | `DATABASE_URL` | Postgres connection string | required for `postgres` |
//! | `DATABASE_MAX_CONNECTIONS` | pool size | `10` |

use thiserror::Error;

pub const STORE_VAR: &str = "MAINTOPS_STORE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "DATABASE_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set when MAINTOPS_STORE=postgres")]
    Missing { var: &'static str },

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
}

/// Which store backs the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StoreConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup` (variable name → value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = lookup(STORE_VAR).unwrap_or_else(|| "memory".to_string());
        match kind.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "" => Ok(StoreConfig::InMemory),
            "postgres" => {
                let database_url = lookup(DATABASE_URL_VAR)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::Missing {
                        var: DATABASE_URL_VAR,
                    })?;
                let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
                    None => DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => match raw.trim().parse::<u32>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            return Err(ConfigError::Invalid {
                                var: MAX_CONNECTIONS_VAR,
                                value: raw,
                                reason: "expected a positive integer",
                            });
                        }
                    },
                };
                Ok(StoreConfig::Postgres(PostgresConfig {
                    database_url,
                    max_connections,
                }))
            }
            _ => Err(ConfigError::Invalid {
                var: STORE_VAR,
                value: kind,
                reason: "expected 'memory' or 'postgres'",
            }),
        }
    }
}
