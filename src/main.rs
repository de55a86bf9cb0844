mod cli;
mod config;
mod error;
mod logging;
mod manager;
mod pipeline;
mod queue;
mod state_machine;
mod storage;
mod store;
mod ui;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cli::{Cli, Command};
use config::AnimatorConfig;
use manager::{JobManager, ManagerSettings};
use pipeline::ProcessRunner;
use state_machine::JobTicket;
use storage::HttpStorageClient;
use store::RedisJobStore;
use ui::JobProgress;

type Manager = JobManager<RedisJobStore, HttpStorageClient, ProcessRunner>;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = AnimatorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Tiers => {
            for (position, tier) in config.tiers.iter().enumerate() {
                println!(
                    "{}. {} ({} {}) success_code={}",
                    position + 1,
                    tier.name,
                    tier.program,
                    tier.args.join(" "),
                    tier.success_code
                );
            }
        }
        Command::Status { job_id } => {
            let manager = build_manager(&config).await?;
            let job = manager.get_job_status(&job_id).await?;
            println!("{}", ui::render_job(&job));
        }
        Command::Submit {
            image_url,
            job_id,
            wait,
        } => {
            let manager = build_manager(&config).await?;
            let ticket = match job_id {
                Some(job_id) => manager.create_job_with_id(&job_id, &image_url).await?,
                None => manager.create_job(&image_url).await?,
            };
            // Spawned work must settle before any error ends the runtime.
            let outcome = if wait {
                watch(&manager, &ticket.job_id).await
            } else {
                print_ticket(&ticket)
            };
            run_until_drained(&manager).await;
            outcome?;
        }
        Command::Consume => {
            let manager = build_manager(&config).await?;
            let client = redis::Client::open(config.redis_url.as_str())?;

            let stop = manager.cancellation_token().child_token();
            let trigger = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, no longer taking new tasks");
                    trigger.cancel();
                }
            });

            let consumed = queue::consume(&manager, &client, &config.queue_key, &stop).await;
            run_until_drained(&manager).await;
            consumed?;
        }
    }

    Ok(())
}

async fn build_manager(config: &AnimatorConfig) -> Result<Manager> {
    let store = RedisJobStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.redis_url))?;
    let storage = HttpStorageClient::new(config.storage_url.as_str())?;
    let runner = ProcessRunner::new(config.tier_timeout());
    Ok(JobManager::new(
        store,
        storage,
        runner,
        ManagerSettings::from(config),
    ))
}

fn print_ticket(ticket: &JobTicket) -> Result<()> {
    println!("{}", serde_json::to_string(ticket)?);
    Ok(())
}

/// Poll `job_id` until it is terminal, showing progress.
async fn watch(manager: &Manager, job_id: &str) -> Result<()> {
    let progress = JobProgress::start(job_id);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id, "interrupted, cancelling job");
                manager.shutdown().await;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let job = manager.get_job_status(job_id).await?;
        progress.update(&job);
        if job.status.is_terminal() {
            progress.finish(&job);
            return Ok(());
        }
    }
}

/// Wait for background jobs; an interrupt cancels whatever is still running.
async fn run_until_drained(manager: &Manager) {
    tokio::select! {
        _ = manager.drain() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling in-flight jobs");
            manager.shutdown().await;
        }
    }
}
