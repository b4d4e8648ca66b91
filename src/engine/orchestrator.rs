//! Pipeline orchestrator: the outermost loop of the service.
//!
//! Walks the configured ranges strictly in order, one at a time: the
//! scraper's browser session and the marketplace rate limits make
//! sequential execution a deliberate choice. Between ranges it sleeps a
//! random duration drawn from a wide window, purely to shape traffic.
//! The loop never terminates on its own; failures are contained per range
//! and the cycle restarts as soon as the previous one finishes.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::range::{RangeOutcome, RangeProcessor};
use crate::types::RangeSpec;

// ---------------------------------------------------------------------------
// Clock seam
// ---------------------------------------------------------------------------

/// Injectable sleep so pause pacing is testable without real-time waits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct PipelineOrchestrator {
    processor: RangeProcessor,
    ranges: Vec<RangeSpec>,
    min_pause_secs: u64,
    max_pause_secs: u64,
    sleeper: Box<dyn Sleeper>,
}

impl PipelineOrchestrator {
    pub fn new(
        processor: RangeProcessor,
        ranges: Vec<RangeSpec>,
        pause_window_secs: (u64, u64),
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        // `draw_pause` needs an ordered window; config validation upholds
        // this for the production path, direct construction must too
        assert!(
            pause_window_secs.0 <= pause_window_secs.1,
            "inverted pause window: {}..={}",
            pause_window_secs.0,
            pause_window_secs.1
        );
        Self {
            processor,
            ranges,
            min_pause_secs: pause_window_secs.0,
            max_pause_secs: pause_window_secs.1,
            sleeper,
        }
    }

    /// One full pass over all configured ranges, in configuration order.
    ///
    /// Never fails: per-range outcomes (including failures) are returned
    /// for reporting and logged along the way.
    pub async fn run_cycle(&self) -> Vec<(String, RangeOutcome)> {
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, ranges = self.ranges.len(), "Cycle started");

        let mut outcomes = Vec::with_capacity(self.ranges.len());
        for (i, spec) in self.ranges.iter().enumerate() {
            if i > 0 {
                let pause = self.draw_pause();
                info!(
                    range = %spec.range_name,
                    pause_mins = format!("{:.2}", pause.as_secs_f64() / 60.0),
                    "Pausing before next range"
                );
                self.sleeper.sleep(pause).await;
            }

            let outcome = self.processor.process(spec).await;
            if let RangeOutcome::Failed { stage } = &outcome {
                warn!(
                    range = %spec.range_name,
                    stage = %stage,
                    "Range failed, continuing with the rest"
                );
            }
            outcomes.push((spec.range_name.clone(), outcome));
        }

        let failed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RangeOutcome::Failed { .. }))
            .count();
        info!(
            %cycle_id,
            completed = outcomes.len() - failed,
            failed,
            "Cycle complete"
        );
        outcomes
    }

    /// Continuous reconciliation: cycle after cycle until the process is
    /// externally terminated.
    pub async fn run_forever(&self) {
        loop {
            self.run_cycle().await;
        }
    }

    fn draw_pause(&self) -> Duration {
        let secs = rand::rng().random_range(self.min_pause_secs..=self.max_pause_secs);
        Duration::from_secs(secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
