use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use ledgerline_core::AppError;
use tracing_subscriber::EnvFilter;

/// Storage engine selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

impl StorageConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage: StorageConfig,
    pub api_host: String,
    pub api_port: u16,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let first_argument = env::args().nth(1);
        Self::from_lookup(first_argument.as_deref(), |name| env::var(name).ok())
    }

    pub fn from_lookup(
        first_argument: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let migrate_only = first_argument == Some("migrate");

        let storage = match lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "postgres".to_owned())
            .as_str()
        {
            "postgres" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
                let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                    Some(value) => value.parse::<u32>().map_err(|error| {
                        AppError::Validation(format!("invalid DATABASE_MAX_CONNECTIONS: {error}"))
                    })?,
                    None => 10,
                };
                if max_connections == 0 {
                    return Err(AppError::Validation(
                        "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
                    ));
                }

                StorageConfig::Postgres {
                    database_url,
                    max_connections,
                }
            }
            "memory" => StorageConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "STORAGE_BACKEND must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && storage == StorageConfig::Memory {
            return Err(AppError::Validation(
                "the migrate command requires STORAGE_BACKEND=postgres".to_owned(),
            ));
        }

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = lookup("API_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        Ok(Self {
            migrate_only,
            storage,
            api_host,
            api_port,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
