use clap::Parser;
use sprout_core::SproutConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use sprout_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "sprout.toml")]
    config: String,

    /// Validate configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // GEMINI_API_KEY and friends may come from a local .env
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match SproutConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins over [service] log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Credential and model are checked here, not on the first upload
    let state = match HttpState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if args.check {
        println!("✅ Config OK: model {}", state.model);
        println!("✅ Listening address: {}:{}", state.config.http.host, state.config.http.port);
        println!("✅ In-flight policy: {:?}", state.session.policy());
        return Ok(());
    }

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

    tracing::info!(
        model = %state.model,
        policy = ?state.session.policy(),
        "Starting Sprout"
    );

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
