use aws_sdk_dynamodb::Client as DynamoClient;
use civic_shared::config::{Config, StoreBackend};
use civic_shared::store::{DynamoStore, MemoryStore, Store};
use civic_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;

    // Storage is initialised once per cold start and shared by every invocation
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Dynamo => {
            let aws_config = aws_config::load_from_env().await;
            Arc::new(DynamoStore::new(
                DynamoClient::new(&aws_config),
                config.table_name.clone(),
            ))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost when the process exits");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        "Starting API (store: {:?}, table: {})",
        config.store_backend,
        config.table_name
    );
    let state = AppState::new(config, store)?;

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
