use castor::{AccountManager, Collaborators, Config};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "castor", version, about = "Switch the Google account a desktop IDE is signed in as")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, env = "CASTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in a new account through the browser
    Add,
    /// Make an added account the active one
    Switch {
        /// Account email
        email: String,
    },
    /// Remove an inactive account
    Remove {
        /// Account email
        email: String,
    },
    /// List added accounts with their cached usage
    List,
    /// Refresh inactive credentials and the active account's usage
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = Arc::new(Config::load(cli.config)?);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        data_dir = %cfg.basic.data_dir.display(),
        loglevel = %cfg.basic.loglevel,
        proxy = %cfg.basic.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        foreign_app = %cfg.foreign_app.name,
        skip_restart = cfg.basic.skip_restart,
    );

    let http_client = cfg.http_client()?;
    let collaborators = Collaborators::system(&cfg, http_client.clone());
    let manager = AccountManager::open(cfg.clone(), http_client, collaborators).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Command::Add => {
            let identity = manager.add_account(&cancel).await?;
            println!("Added {identity}");
        }
        Command::Switch { email } => match manager.switch_account(&email, &cancel).await {
            Ok(()) => println!("Switched to {email}"),
            Err(e) if e.is_unconfirmed_switch() => {
                println!("Switched to {email}, but the application did not confirm it: {e}");
            }
            Err(e) => return Err(e.into()),
        },
        Command::Remove { email } => {
            manager.remove_account(&email).await?;
            println!("Removed {email}");
        }
        Command::List => print_accounts(&manager).await,
        Command::Refresh => {
            let summary = manager.refresh_inactive_accounts().await?;
            if let Err(e) = manager.refresh_active_usage().await {
                error!(error = %e, "Active usage refresh failed");
            }
            println!(
                "Refreshed {} account(s), {} failed",
                summary.refreshed.len(),
                summary.failed.len()
            );
            for (identity, reason) in &summary.failed {
                println!("  {identity}: {reason}");
            }
        }
    }
    Ok(())
}

async fn print_accounts(manager: &AccountManager) {
    let accounts = manager.accounts().await;
    if accounts.is_empty() {
        println!("No accounts added.");
        return;
    }

    for account in accounts {
        let marker = if account.is_active { "*" } else { " " };
        let quota = account
            .snapshot
            .as_ref()
            .and_then(|s| {
                s.models
                    .iter()
                    .filter_map(|m| m.remaining_fraction)
                    .min_by(f64::total_cmp)
            })
            .map_or_else(|| "-".to_string(), |f| format!("{:.0}%", f * 100.0));
        let cached = if account.is_using_cached_data { " (cached)" } else { "" };
        println!(
            "{marker} {:<40} quota {quota}{cached}  updated {}",
            account.identity,
            account.updated_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(err) = &account.last_error {
            println!("    last error: {err}");
        }
    }
}
