use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use opsdesk_server::{routes, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("opsdesk_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;

    let state = AppState::initialize(pool, config.upload_root.clone()).await?;
    tracing::info!(
        mode = state.gate.mode().as_str(),
        uploads = %config.upload_root.display(),
        "opsdesk initialized"
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "opsdesk listening");
    axum::serve(listener, app).await?;
    Ok(())
}
