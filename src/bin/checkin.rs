//! Check-in runner binary.
//!
//! Runs the check-in flow for each selected site (default: every site
//! with credentials configured), pushes the outcome to Telegram, and
//! exits 0 only when every selected site succeeded. Failures are
//! best-effort notified before the non-zero exit.

use std::path::PathBuf;
use std::process::ExitCode;

use acg_checkin::config::AppConfig;
use acg_checkin::notify::TelegramNotifier;
use acg_checkin::session::SessionStore;
use acg_checkin::{lightnovel, report, twodfan};

struct Args {
    config_path: PathBuf,
    sites: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config_path = PathBuf::from("config.toml");
    let mut sites = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?
                    .into();
            }
            "lightnovel" | "twodfan" => sites.push(arg),
            other => anyhow::bail!("unknown argument: {other} (expected lightnovel, twodfan, or --config <path>)"),
        }
    }

    Ok(Args { config_path, sites })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = AppConfig::load(&args.config_path)
        .map_err(|e| anyhow::anyhow!("cannot start without config: {e}"))?;
    let store = SessionStore::new(config.cache_path(&args.config_path));
    let notifier = TelegramNotifier::new(config.telegram.clone());

    // Explicit selection runs exactly what was asked for; the default is
    // every site with credentials.
    let run_lightnovel = if args.sites.is_empty() {
        config.lightnovel.has_credentials()
    } else {
        args.sites.iter().any(|s| s == "lightnovel")
    };
    let run_twodfan = if args.sites.is_empty() {
        config.twodfan.has_credentials()
    } else {
        args.sites.iter().any(|s| s == "twodfan")
    };

    if !run_lightnovel && !run_twodfan {
        anyhow::bail!("no site selected and no site credentials configured");
    }

    let mut failed = false;

    if run_lightnovel {
        tracing::info!("starting lightnovel check-in");
        match lightnovel::run(&config.lightnovel, &store).await {
            Ok(message) => {
                tracing::info!("lightnovel check-in succeeded");
                notifier.send(&message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "lightnovel check-in failed");
                notifier
                    .send(&report::lightnovel_failure(None, &e.to_string()))
                    .await;
                failed = true;
            }
        }
    }

    if run_twodfan {
        tracing::info!("starting 2dfan check-in");
        match twodfan::run(&config.twodfan, &store).await {
            Ok(message) => {
                tracing::info!("2dfan check-in succeeded");
                notifier.send(&message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "2dfan check-in failed");
                let username = (!config.twodfan.username.is_empty())
                    .then_some(config.twodfan.username.as_str());
                notifier
                    .send(&report::twodfan_failure(username, &e.to_string()))
                    .await;
                failed = true;
            }
        }
    }

    Ok(if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
