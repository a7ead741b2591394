use std::sync::Arc;

use clap::Parser;
use folio_core::store::{MemoryStore, PgStore, RecordStore};
use folio_core::FolioConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use folio_server::{bot, http, subsystems, AppContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "folio.toml")]
    config: String,

    /// Check store connectivity and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match FolioConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store = match open_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open {} store: {}", config.database.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ Store connected: {}", v),
            Err(e) => {
                println!("❌ Store health check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Folio health check passed");
        return Ok(());
    }

    let ctx = match AppContext::from_config(config, store) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to initialise service clients: {:#}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let mut tasks = Vec::new();

    if ctx.config.scheduler.enabled {
        tasks.push(tokio::spawn(subsystems::scheduler::run_scheduler_loop(
            ctx.clone(),
            tx.subscribe(),
        )));
    } else {
        tracing::info!("Update scheduler disabled");
    }

    match ctx.messenger.clone() {
        Some(messenger) => {
            tasks.push(tokio::spawn(bot::run_bot_loop(
                ctx.clone(),
                messenger,
                tx.subscribe(),
            )));
        }
        None => tracing::info!("Telegram disabled, bot loop not started"),
    }

    if ctx.config.http.enabled {
        http::start_http_server(ctx.clone(), tx.subscribe()).await?;
    } else {
        let mut shutdown = tx.subscribe();
        let _ = shutdown.recv().await;
    }

    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("Folio stopped");
    Ok(())
}

async fn open_store(config: &FolioConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.database.backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        "postgres" => {
            let pool = folio_core::db::create_pool(&config.database).await?;
            folio_core::db::run_migrations(&pool).await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            Ok(Arc::new(PgStore::new(pool)))
        }
        other => anyhow::bail!(
            "unknown database backend '{}' (expected memory or postgres)",
            other
        ),
    }
}
