//! vtc-sa - Session Analysis microservice
//!
//! Ends training sessions, computes transcript metrics, obtains qualitative
//! analyses and reconciles them with stored session state.
//!
//! Default port: 5731

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vtc_sa::config::{CliOverrides, ServiceConfig, SERVICE_NAME};
use vtc_sa::services::{ChatCompletionsProvider, HttpConversationProvider};
use vtc_sa::AppState;

/// Command-line arguments for vtc-sa
#[derive(Parser, Debug)]
#[command(name = "vtc-sa")]
#[command(about = "Voice training coach - Session Analysis")]
#[command(version)]
struct Args {
    /// Path to TOML config file (default: ~/.config/vtc/vtc-sa.toml)
    #[arg(short, long, env = "VTC_SA_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// HTTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Shared secret for trusted server-to-server callers
    #[arg(long)]
    internal_secret: Option<String>,

    /// API key for the analysis provider
    #[arg(long)]
    analysis_api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Mint a bearer token for an owner and print it once
    IssueToken {
        /// Owning identity the token authenticates as
        owner_id: String,
        /// Lifetime in days (default: no expiry)
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = vtc_common::config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration file")?;

    // RUST_LOG wins over the TOML level
    let default_filter = format!(
        "vtc_sa={level},vtc_common={level},tower_http=info",
        level = toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .init();

    info!(
        "Starting {} v{} [{}] built {} ({})",
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = CliOverrides {
        host: args.host,
        port: args.port,
        database_path: args.database,
        internal_secret: args.internal_secret,
        analysis_api_key: args.analysis_api_key,
    };
    let config = ServiceConfig::resolve(cli, toml_config);

    info!("Database: {}", config.database_path.display());
    let db = vtc_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    if let Some(Command::IssueToken {
        owner_id,
        expires_in_days,
    }) = args.command
    {
        let expires_at = expires_in_days.map(|days| chrono::Utc::now() + chrono::Duration::days(days));
        let token = vtc_sa::db::tokens::issue_token(&db, &owner_id, expires_at).await?;
        info!(owner_id = %owner_id, "Issued access token");
        println!("{}", token);
        return Ok(());
    }

    let analysis_provider = ChatCompletionsProvider::new(&config.analysis)
        .map_err(|e| anyhow::anyhow!("Failed to build analysis provider client: {}", e))?;
    let conversations = HttpConversationProvider::new(&config.conversations)
        .map_err(|e| anyhow::anyhow!("Failed to build conversation provider client: {}", e))?;

    let bind_addr = config.bind_addr();
    let state = AppState::new(db, config, Arc::new(analysis_provider), Arc::new(conversations));
    let app = vtc_sa::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("{} stopped", SERVICE_NAME);
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
