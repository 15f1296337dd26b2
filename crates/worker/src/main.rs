//! PageStash Background Worker
//!
//! Handles scheduled jobs including:
//! - Monthly usage counter reset sweep (first of each month, 00:05 UTC)
//! - Storage usage reconciliation against the clips table (daily at 3:00 AM UTC)
//! - Billing invariant sweep (daily at 4:00 AM UTC)
//! - Health check heartbeat (every 5 minutes)
//!
//! The usage reset is also applied lazily by the API on every read and
//! write, so this sweep only tidies rows for users who went inactive.

use pagestash_billing::{InvariantChecker, UsageMeter};
use pagestash_shared::create_pool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting PageStash Worker");

    // Create database pool
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = create_pool(&database_url).await?;

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Monthly usage reset sweep
    // Cron: 00:05 UTC on the first of each month. The lazy reset in the API
    // keeps active users correct; this catches everyone else.
    let reset_meter = UsageMeter::new(pool.clone());
    scheduler
        .add(Job::new_async("0 5 0 1 * *", move |_uuid, _l| {
            let meter = reset_meter.clone();
            Box::pin(async move {
                info!("Running monthly usage reset sweep");
                match meter.sweep_monthly_reset().await {
                    Ok(count) => info!(rows_reset = count, "Monthly usage reset complete"),
                    Err(e) => error!(error = %e, "Monthly usage reset failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Monthly usage reset (1st of month, 00:05 UTC)");

    // Job 2: Storage reconciliation (daily at 3:00 AM UTC)
    // Recomputes storage_used_mb from the clips table to correct drift from
    // interrupted deletes.
    let reconcile_meter = UsageMeter::new(pool.clone());
    scheduler
        .add(Job::new_async("0 0 3 * * *", move |_uuid, _l| {
            let meter = reconcile_meter.clone();
            Box::pin(async move {
                info!("Running storage reconciliation");
                match meter.reconcile_storage().await {
                    Ok(count) => {
                        if count > 0 {
                            warn!(rows_corrected = count, "Storage totals drifted and were corrected");
                        } else {
                            info!("Storage totals consistent");
                        }
                    }
                    Err(e) => error!(error = %e, "Storage reconciliation failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Storage reconciliation (daily at 3:00 AM UTC)");

    // Job 3: Billing invariant sweep (daily at 4:00 AM UTC)
    let checker = InvariantChecker::new(pool.clone());
    scheduler
        .add(Job::new_async("0 0 4 * * *", move |_uuid, _l| {
            let checker = checker.clone();
            Box::pin(async move {
                info!("Running billing invariant sweep");
                match checker.run_all().await {
                    Ok(summary) if summary.healthy() => {
                        info!(checks_run = summary.checks_run, "Billing invariants hold");
                    }
                    Ok(summary) => {
                        for violation in &summary.violations {
                            error!(
                                invariant = %violation.invariant,
                                severity = %violation.severity,
                                affected_users = violation.user_ids.len(),
                                description = %violation.description,
                                "Billing invariant violated"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "Billing invariant sweep failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Billing invariant sweep (daily at 4:00 AM UTC)");

    // Job 4: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    // Start the scheduler
    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("PageStash Worker started successfully with 4 scheduled jobs");

    // Keep the main task running
    // The scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    }
}
