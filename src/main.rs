use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use natours_api::config::AppConfig;
use natours_api::database::models::all_schemas;
use natours_api::database::{DatabaseManager, DocumentStore, MemoryStore, PgDocumentStore};
use natours_api::services::{LogMailer, StripeGateway};
use natours_api::{app, AppState};

#[derive(Parser)]
#[command(name = "natours-api")]
#[command(about = "Tour booking API server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Override PORT")]
        port: Option<u16>,
    },

    #[command(about = "Create the documents table and its indexes")]
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Migrate => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::migrate(&pool, &all_schemas()).await?;
            info!("Migration complete");
            Ok(())
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Natours API in {:?} mode", config.environment);

    let store: Arc<dyn DocumentStore> = match config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::migrate(&pool, &all_schemas()).await?;
            Arc::new(PgDocumentStore::new(pool))
        }
        None => {
            warn!("No DATABASE configured, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let payments = Arc::new(StripeGateway::new(config.payments.stripe_secret_key.clone()));
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(config, store, Arc::new(LogMailer::default()), payments);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("🚀 Natours API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
