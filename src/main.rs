mod config;
mod db;
mod gate;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::identity::PgIdentity;
use services::profile::PgProfileStore;

#[tokio::main]
async fn main() {
    // Load .env if present so local runs pick up DATABASE_URL and friends.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let identity = Arc::new(PgIdentity::new(pool.clone(), config.session_ttl_hours));
    let profiles = Arc::new(PgProfileStore::new(pool));

    let port = config.port;
    let base_url = config.base_url.to_string();
    let state = state::AppState::new(config, identity, profiles);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %base_url, "gatehouse listening");
    axum::serve(listener, app).await.expect("server failed");
}
