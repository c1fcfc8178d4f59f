use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_db::WardenDb;
use warden_server::{
    build_router, reaper, startup, AppState, ServerConfig, ServerError, ServerResult,
};

#[derive(Parser)]
#[command(name = "warden-server")]
#[command(about = "Warden auth adapter")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file (default: ./warden.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_panic_hook();
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("warden_server=debug,warden_auth=debug,warden_db=debug,tower_http=debug,info")
        } else {
            EnvFilter::new("warden_server=info,warden_auth=info,warden_db=info,warn")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(cli.debug))
        .with(env_filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    let config = ServerConfig::load(cli.config.as_deref())?;

    let db = WardenDb::connect(&config.database_url, &config.store_options()).await?;
    startup::check_schema(&db, warden_db::SCHEMA_VERSION, config.schema_check).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let grace = config.reap_grace()?;
    let addr = config.bind_addr;
    let reap_interval = config.reap_interval();
    let state = AppState::new(config, db.clone())?;

    let reaper = reap_interval
        .map(|interval| reaper::spawn_reaper(db.clone(), interval, grace, shutdown_rx));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve);

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reaper {
        let _ = handle.await;
    }
    db.close().await;
    info!("Shut down");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
