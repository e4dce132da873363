use std::sync::Arc;

use clap::Parser;
use salescast_core::{Forecaster, ModelArtifacts, PgStore, PredictionStore, SalescastConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use salescast_server::http::{start_http_server, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "salescast.toml")]
    config: String,

    /// Load artifacts, check the database if configured, then exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match SalescastConfig::load(&args.config) {
        Ok(c) => c.with_database_url(std::env::var("DATABASE_URL").ok()),
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let artifacts = ModelArtifacts::load(&config.artifacts);
    tracing::info!(
        models = artifacts.registry.len(),
        features = artifacts.feature_list.len(),
        encoders = artifacts.encoders.len(),
        fallback_mode = artifacts.fallback_mode(),
        "Artifacts loaded"
    );

    // Connect to DB only when persistence is configured
    let pool = match config.database.active_url() {
        Some(_) => match salescast_core::db::create_pool(&config.database).await {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    if args.health {
        println!(
            "✅ Artifacts: {} models, {} features, {} encoders",
            artifacts.registry.len(),
            artifacts.feature_list.len(),
            artifacts.encoders.len()
        );
        if artifacts.fallback_mode() {
            println!("⚠️  No models loaded, predictions will use the fallback heuristic");
        }

        match &pool {
            Some(pool) => match salescast_core::db::health_check(pool).await {
                Ok(()) => println!("✅ PostgreSQL connected"),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            },
            None => println!("ℹ️  Persistence disabled"),
        }

        println!("✅ Salescast health check passed");
        return Ok(());
    }

    let store: Option<Arc<dyn PredictionStore>> = match pool {
        Some(pool) => {
            if let Err(e) = salescast_core::db::create_tables(&pool).await {
                eprintln!("Failed to create tables: {}", e);
                std::process::exit(1);
            }
            tracing::info!("Persistence enabled");
            Some(Arc::new(PgStore::new(pool)))
        }
        None => None,
    };

    let forecaster = Forecaster::from_config(artifacts, &config.prediction);
    let state = Arc::new(
        HttpState::new(forecaster, store).with_cors_origins(config.http.cors_origins.clone()),
    );

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

    start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
