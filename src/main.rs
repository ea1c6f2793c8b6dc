//! Aviary CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aviary::adapters::rest::{self, ApiState};
use aviary::adapters::sqlite::SqliteRegistry;
use aviary::services::auth::AuthService;
use aviary::services::config::Config;

#[derive(Parser)]
#[command(name = "aviary", about = "Drone lifecycle orchestrator", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "aviary.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the observability REST API backed by the drone registry.
    Serve,
    /// Issue an access token for the REST API.
    Token {
        /// Username embedded in the token (`sub` claim).
        #[arg(long)]
        user: String,
        /// Scope to grant; repeat for multiple scopes.
        #[arg(long = "scope")]
        scopes: Vec<String>,
        /// Token lifetime in minutes; omit for a non-expiring token.
        #[arg(long)]
        expires_minutes: Option<i64>,
    },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve => {
            init_tracing(&config);

            let restapi = config
                .services
                .restapi
                .clone()
                .context("services.restapi must be configured to serve the API")?;
            let auth = Arc::new(AuthService::from_config(&config)?);
            let registry = Arc::new(
                SqliteRegistry::open(&config.registry.database_path)
                    .await
                    .context("Failed to open the drone registry")?,
            );

            rest::serve(ApiState { registry, auth }, &restapi.host, restapi.port).await
        }
        Commands::Token {
            user,
            scopes,
            expires_minutes,
        } => {
            let auth = AuthService::from_config(&config)?;
            let token = auth.create_access_token(
                &user,
                &scopes,
                expires_minutes.map(chrono::Duration::minutes),
                None,
                None,
            )?;
            println!("{token}");
            Ok(())
        }
    }
}
