//! Repeated update runs on a fixed interval.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use crate::update::{Collaborators, UpdateConfig, UpdateProgress, run_update};

/// Shortest period accepted by the ticker.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// When and how often [`watch`] runs an update.
#[derive(Debug, Clone)]
pub struct WatchSchedule {
    /// Time between the starts of consecutive runs. The first run starts
    /// immediately.
    pub interval: Duration,
    /// Stop after this many runs. `None` runs until shutdown.
    pub max_runs: Option<usize>,
}

/// Totals over all runs of a watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOutcome {
    pub runs: usize,
    pub failures: usize,
    /// New posts processed across every successful run.
    pub processed: usize,
}

/// Run [`run_update`] once per tick until `shutdown` resolves or the run
/// limit is reached.
///
/// Runs never overlap: the next tick is only awaited after the current run
/// has finished, and ticks missed during a long run are not replayed. A
/// failed run is logged and the next tick starts a fresh run.
#[instrument(skip_all, fields(interval_ms = schedule.interval.as_millis()))]
pub async fn watch<F>(
    config: &UpdateConfig,
    collab: Collaborators<'_>,
    progress: &dyn UpdateProgress,
    schedule: &WatchSchedule,
    shutdown: F,
) -> WatchOutcome
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(schedule.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut outcome = WatchOutcome::default();

    while schedule.max_runs.is_none_or(|max| outcome.runs < max) {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!(runs = outcome.runs, "shutdown requested, stopping watch");
                break;
            }
            _ = ticker.tick() => {}
        }

        outcome.runs += 1;
        match run_update(config, collab, progress).await {
            Ok(report) => {
                outcome.processed += report.processed.len();
                info!(
                    run = outcome.runs,
                    new = report.processed.len(),
                    known = report.items_known,
                    "scheduled update finished"
                );
            }
            Err(e) => {
                outcome.failures += 1;
                error!(
                    run = outcome.runs,
                    kind = e.kind(),
                    error = %e,
                    "scheduled update failed, retrying next tick"
                );
            }
        }
    }

    outcome
}
