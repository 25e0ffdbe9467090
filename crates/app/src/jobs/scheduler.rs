use std::time::Duration;

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::warn;

use crate::jobs::JobError;

const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Runs `job` on every tick; the first tick fires immediately.
pub async fn run_interval<F, Fut>(
    name: &'static str,
    interval_duration: Duration,
    mut job: F,
) -> Result<(), JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), JobError>>,
{
    let mut ticker = interval(interval_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = job().await {
            warn!(error = %err, job = name, "job execution failed");
            sleep(FAILURE_BACKOFF).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::run_interval;

    #[tokio::test(start_paused = true)]
    async fn runs_job_on_each_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = tokio::spawn(run_interval("count", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
