use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use tradehall::auth::IdentityProvider;
use tradehall::config::{Cli, Command, Config};
use tradehall::db;
use tradehall::routes;
use tradehall::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.storage_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::LogoutAll => {
            let removed = state.identity.sign_out_all().await?;
            println!("Signed out {} session(s)", removed);
            Ok(())
        }
        Command::Serve => serve(state, &config).await,
    }
}

async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
