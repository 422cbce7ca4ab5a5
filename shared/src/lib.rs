pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod password;
pub mod problems;
pub mod queries;
pub mod response;
pub mod store;
pub mod token;
pub mod types;
pub mod users;

use std::sync::Arc;

use config::Config;
use store::Store;
use token::{TokenError, TokenService};

/// Shared application state, built once per cold start and reused by every
/// invocation the process serves.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenService,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Arc<Self>, TokenError> {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_days)?;
        Ok(Arc::new(Self {
            config,
            tokens,
            store,
        }))
    }

    pub fn origin(&self) -> &str {
        &self.config.allowed_origin
    }
}
