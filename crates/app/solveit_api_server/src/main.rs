//! Solveit authentication API server binary.

use std::sync::Arc;

use clap::Parser;
use solveit_api::AppState;
use solveit_api::config::ApiConfig;
use solveit_core::cache::memory::{DEFAULT_CLEANUP_INTERVAL, MemoryCache};
use solveit_core::mail::LogMailer;
use solveit_core::models::user::OAuthProvider;
use solveit_core::oauth2::transport::HttpTransport;
use solveit_core::store::postgres::PgCredentialStore;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "solveit_api_server", about = "Solveit authentication API server")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/solveit"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,solveit_api=debug,solveit_core=debug".parse().unwrap()
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.database_url = args.database_url;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting solveit_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    // Run database migrations.
    info!("running database migrations");
    solveit_api::migrate(&pool).await?;

    let cache = Arc::new(MemoryCache::new());
    cache.spawn_cleanup_task(DEFAULT_CLEANUP_INTERVAL);

    let state = AppState::new(
        config.clone(),
        Arc::new(PgCredentialStore::new(pool)),
        cache,
        Arc::new(LogMailer::new(&config.oauth.frontend_url)),
        Arc::new(HttpTransport::new(config.oauth.http_timeout)?),
    );

    for provider in [OAuthProvider::Google, OAuthProvider::Facebook] {
        info!(%provider, enabled = state.oauth.is_enabled(provider), "oauth2 provider");
    }

    let app = solveit_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
