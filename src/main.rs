// src/main.rs

mod config;
mod db;
mod error;
mod forms;
mod models;
mod services;
mod state;
mod templates;
mod web;

use crate::{
    config::{Config, DEFAULT_LOG_FILTER},
    services::seed_service::{self, BootstrapOptions},
    state::AppState,
};
use axum::serve;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "lrc-database", about = "Learning Resource Center scheduling and loans")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Seed the database with synthetic and roster data
    Bootstrap(BootstrapArgs),
}

#[derive(Debug, Args)]
struct BootstrapArgs {
    #[arg(long, default_value = "admin")]
    superuser_username: String,
    #[arg(long, default_value = "admin")]
    superuser_password: String,
    #[arg(long, default_value_t = 20)]
    user_count: usize,
    #[arg(long, default_value_t = 8)]
    course_count: usize,
    #[arg(long, default_value_t = 100)]
    shift_count: usize,
    #[arg(long, default_value_t = 5)]
    hardware_count: usize,
    #[arg(long, default_value_t = 10)]
    change_request_count: usize,
    /// Same seed, same synthetic data
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    si_roster: Option<PathBuf>,
    #[arg(long)]
    supervisor_roster: Option<PathBuf>,
    #[arg(long)]
    shift_roster: Option<PathBuf>,
    #[arg(long)]
    exam_review_roster: Option<PathBuf>,
}

impl From<BootstrapArgs> for BootstrapOptions {
    fn from(args: BootstrapArgs) -> Self {
        BootstrapOptions {
            superuser_username: args.superuser_username,
            superuser_password: args.superuser_password,
            user_count: args.user_count,
            course_count: args.course_count,
            shift_count: args.shift_count,
            hardware_count: args.hardware_count,
            change_request_count: args.change_request_count,
            seed: args.seed,
            si_roster: args.si_roster,
            supervisor_roster: args.supervisor_roster,
            shift_roster: args.shift_roster,
            exam_review_roster: args.exam_review_roster,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Could not open the database: {}", e);
            return Err(anyhow::anyhow!("Failed to connect to or migrate the database: {}", e));
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Bootstrap(args) => {
            let report = seed_service::bootstrap(&db_pool, &args.into()).await?;
            tracing::info!(
                "🌱 Bootstrap done: {} users, {} courses, {} shifts, {} hardware, {} change requests",
                report.users,
                report.courses,
                report.shifts,
                report.hardware,
                report.change_requests
            );
            Ok(())
        }
        Command::Serve => serve_app(config, db_pool).await,
    }
}

async fn serve_app(config: Config, db_pool: sqlx::SqlitePool) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting LRC database server...");

    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Failed to create session store: {}", e))?;
    session_store.migrate().await?;

    let cleanup_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = cleanup_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Expired session cleanup stopped: {:?}", e);
        }
    });
    tracing::info!("🧹 Expired session cleanup scheduled hourly.");

    let app = web::routes::build_app(AppState { db_pool }, session_store, config.session_expiry_hours);

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Could not listen on {}: {}", config.bind_addr, e);
            return Err(e.into());
        }
    };
    tracing::info!("📡 Listening on http://{}", config.bind_addr);

    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
