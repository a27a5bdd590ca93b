use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

mod routes;
mod storage;

use storage::LocationStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LocationStore>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route(
            "/api/parking-locations",
            get(routes::list_locations).post(routes::create_location),
        )
        .route(
            "/api/parking-locations/{id}",
            get(routes::get_location)
                .patch(routes::update_location)
                .delete(routes::delete_location),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ramp_server=info".into()),
        )
        .init();

    let addr = std::env::var("RAMP_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
    let store = match std::env::var("RAMP_DATA_FILE") {
        Ok(path) => LocationStore::open(path.into()).await?,
        Err(_) => LocationStore::in_memory(),
    };

    let state = AppState {
        store: Arc::new(store),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
