// src/main.rs

mod db;
mod error;
mod models;
mod services;
mod state;
#[cfg(test)]
mod test_support;
mod web;

use crate::state::AppState;
use axum::serve;
use std::{env, net::SocketAddr};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "campus_attendance=debug,tower_http=info,sqlx=warn".into())
                .into()
        }))
        .with(fmt::layer())
        .init();

    tracing::info!("starting campus attendance service...");

    let db_pool = match db::create_db_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("database initialization failed: {}", e);
            return Err(anyhow::anyhow!("failed to connect or migrate database: {}", e));
        }
    };

    let app_state = AppState { db_pool };

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid BIND_ADDR '{}': {}", bind_addr, e))?;

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            return Err(e.into());
        }
    };
    tracing::info!("listening on http://{}", addr);

    let app = web::routes::create_router(app_state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
