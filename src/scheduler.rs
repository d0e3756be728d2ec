// src/scheduler.rs
//! Interval scheduler for the `start` command: tick, jitter, run.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// Random delay added before each run so deployments sharing a cadence
    /// do not hit the boards at the same instant.
    pub jitter_max: Duration,
}

/// Drive `tick` forever on the configured cadence. The first tick fires
/// immediately; a failed run is logged and the loop keeps going.
pub async fn run_scheduler<F, Fut>(cfg: SchedulerCfg, mut tick: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    info!(
        interval_s = cfg.interval.as_secs(),
        jitter_max_s = cfg.jitter_max.as_secs(),
        "scheduler running"
    );

    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let jitter = jitter_delay(cfg.jitter_max);
        if !jitter.is_zero() {
            info!(jitter_s = jitter.as_secs(), "scheduled run triggered");
            tokio::time::sleep(jitter).await;
        }

        if let Err(err) = tick().await {
            error!(error = ?err, "scheduled run failed");
        }
    }
}

fn jitter_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
