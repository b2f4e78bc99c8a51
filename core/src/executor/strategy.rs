use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::perf::LevelMeasurement;

/// How the next level is dispatched in adaptive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Parallel,
    Sequential,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    SwitchTo(DispatchMode),
}

/// Decides between parallel and sequential dispatch from level measurements.
///
/// Owned by the dispatch loop and consulted once per level boundary.
///
/// A parallel window is scored by its efficiency; one score below the
/// threshold drops to sequential. A sequential window says nothing about
/// overlap, so it is scored by how much slower tasks ran side by side:
/// its mean task latency divided by the mean latency of the last parallel
/// window, capped at 1. Going back to parallel takes `upgrade_windows`
/// favorable sequential scores in a row. Windows with fewer than two tasks
/// are ignored.
#[derive(Debug, Clone)]
pub struct StrategySelector {
    threshold: f64,
    upgrade_windows: usize,
    favorable_streak: usize,
    /// Mean task latency of the most recent parallel window.
    parallel_latency: Option<Duration>,
    last_score: Option<f64>,
}

impl StrategySelector {
    pub fn new(threshold: f64, upgrade_windows: usize) -> Self {
        Self {
            threshold,
            upgrade_windows: upgrade_windows.max(1),
            favorable_streak: 0,
            parallel_latency: None,
            last_score: None,
        }
    }

    /// Score behind the most recent decision that looked at a window.
    pub fn last_score(&self) -> Option<f64> {
        self.last_score
    }

    pub fn decide(&mut self, current: DispatchMode, window: &LevelMeasurement) -> Decision {
        if window.tasks < 2 {
            return Decision::Keep;
        }

        match current {
            DispatchMode::Parallel => {
                self.favorable_streak = 0;
                self.parallel_latency = Some(window.mean_latency());
                self.last_score = Some(window.efficiency);
                if window.efficiency >= self.threshold {
                    Decision::Keep
                } else {
                    Decision::SwitchTo(DispatchMode::Sequential)
                }
            }
            DispatchMode::Sequential => {
                let Some(score) = self.sequential_score(window) else {
                    return Decision::Keep;
                };
                self.last_score = Some(score);
                if score < self.threshold {
                    self.favorable_streak = 0;
                    return Decision::Keep;
                }
                self.favorable_streak += 1;
                if self.favorable_streak >= self.upgrade_windows {
                    self.favorable_streak = 0;
                    Decision::SwitchTo(DispatchMode::Parallel)
                } else {
                    Decision::Keep
                }
            }
        }
    }

    /// `None` until a parallel window has been seen.
    fn sequential_score(&self, window: &LevelMeasurement) -> Option<f64> {
        let parallel = self.parallel_latency?;
        if parallel.is_zero() {
            return Some(1.0);
        }
        let ratio = window.mean_latency().as_secs_f64() / parallel.as_secs_f64();
        Some(ratio.min(1.0))
    }
}
