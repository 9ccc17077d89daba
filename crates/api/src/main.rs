//! MentorHub API server entrypoint

use mentorhub_api::{routes::create_router, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let bind_address = config.bind_address.clone();

    let pool =
        mentorhub_shared::create_pool(&config.database_url, config.database_max_connections)
            .await?;
    mentorhub_shared::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let state = AppState::new(pool, config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "MentorHub API listening");

    axum::serve(listener, router).await?;

    Ok(())
}
