use time::OffsetDateTime;
use tracing::{info, warn};

use crate::batch::BatchJob;
use crate::error::CollectorError;
use crate::utils::date::next_fire_after;

/// Runs `job` every day at `hour:00` UTC until Ctrl+C.
///
/// Runs never overlap: the next fire time is computed only after the current
/// run has finished. A failed run is left for the next trigger.
pub(crate) async fn run_daily(
    job: &BatchJob,
    hour: u8,
    run_now: bool,
) -> Result<String, CollectorError> {
    info!(hour, "Scheduler started. Executes at {hour:02}:00 UTC daily.");

    if run_now {
        info!("Manually triggered run");
        run_once(job).await;
    }

    loop {
        let now = OffsetDateTime::now_utc();
        let next = next_fire_after(now, hour)?;
        info!(next = %next, "Next scheduled run");

        let wait = std::time::Duration::try_from(next - now).unwrap_or(std::time::Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped");
                return Ok("Scheduler stopped.".to_string());
            }
        }

        run_once(job).await;
    }
}

async fn run_once(job: &BatchJob) {
    info!("Batch job executing");
    match job.run().await {
        Ok(summary) => info!(
            published = summary.records_published,
            fetched = summary.records_fetched,
            "Batch job completed"
        ),
        Err(err) => warn!("Batch job failed; waiting for the next trigger: {err}"),
    }
}
