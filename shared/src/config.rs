use thiserror::Error;

const DEFAULT_TABLE_NAME: &str = "civic-commons";
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
const MAX_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Dynamo,
    Memory,
}

/// Runtime settings, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub table_name: String,
    pub store_backend: StoreBackend,
    pub cookie_secure: bool,
    pub allowed_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let token_ttl_days = match lookup("TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_TOKEN_TTL_DAYS).contains(days))
                .ok_or(ConfigError::Invalid {
                    name: "TOKEN_TTL_DAYS",
                    value: raw,
                })?,
            None => DEFAULT_TOKEN_TTL_DAYS,
        };

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("dynamo") => StoreBackend::Dynamo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let cookie_secure = match lookup("COOKIE_SECURE").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "COOKIE_SECURE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            jwt_secret,
            token_ttl_days,
            table_name: lookup("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            store_backend,
            cookie_secure,
            allowed_origin: lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "*".to_string()),
        })
    }
}
