use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_db::{StoreOptions, WardenDb};
use warden_migration::Migrator;

#[derive(Parser)]
#[command(name = "warden-migrate")]
#[command(about = "Apply Warden entity store migrations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Stop after this version instead of the newest known
        #[arg(long)]
        target: Option<i64>,
    },
    /// Show recorded and pending versions
    Status,
    /// List applied migrations
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_panic_hook();
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("warden_migration=debug,warden_db=debug,info")
        } else {
            EnvFilter::new("warden_migration=info,warden_db=info,warn")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(cli.debug))
        .with(env_filter)
        .init();

    // Migrations must be able to create the store file.
    let url = if cli.database_url.starts_with("sqlite:") && !cli.database_url.contains("mode=") {
        let sep = if cli.database_url.contains('?') { '&' } else { '?' };
        format!("{}{}mode=rwc", cli.database_url, sep)
    } else {
        cli.database_url.clone()
    };

    let db = WardenDb::connect(&url, &StoreOptions::default()).await?;
    let migrator = Migrator::new(db.pool().clone());

    match cli.command {
        Commands::Up { target } => {
            let applied = migrator.apply_pending(target).await?;
            if applied.is_empty() {
                println!("Nothing to apply.");
            }
            for m in &applied {
                println!("applied {:>4}  {}", m.version, m.name);
            }
        }
        Commands::Status => {
            let status = migrator.status().await?;
            println!("recorded version: {}", status.current);
            println!("latest known:     {}", status.latest);
            println!("compiled entities: {}", warden_db::SCHEMA_VERSION);
            for (version, name) in &status.pending {
                println!("pending {:>4}  {}", version, name);
            }
        }
        Commands::History => {
            for m in migrator.applied().await? {
                println!(
                    "{:>4}  {:<24} {}",
                    m.version,
                    m.name,
                    m.applied_at.to_rfc3339()
                );
            }
        }
    }

    db.close().await;
    info!("Done");
    Ok(())
}
