use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Point-in-time view of run performance.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub completed: usize,
    pub tasks_per_sec: f64,
    pub avg_latency: Duration,
    /// Efficiency of the most recent level window, or of the whole run so far
    /// when no level has been measured.
    pub parallel_efficiency: f64,
    /// Mean over all measured level windows.
    pub mean_level_efficiency: Option<f64>,
    pub max_concurrency: usize,
}

/// Measurement of one finished dependency level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelMeasurement {
    /// Tasks that actually ran in the level (skipped ones are not counted).
    pub tasks: usize,
    /// Dispatch slots the level had: 1 when run sequentially.
    pub slots: usize,
    pub wall: Duration,
    /// Sum of individual task durations.
    pub busy: Duration,
    pub efficiency: f64,
}

impl LevelMeasurement {
    /// Average duration of one task in the level.
    pub fn mean_latency(&self) -> Duration {
        self.busy / self.tasks.max(1) as u32
    }
}

#[derive(Debug)]
struct LevelWindow {
    started: Instant,
    slots: usize,
    tasks: usize,
    busy: Duration,
}

#[derive(Debug)]
struct TrackerState {
    started: Instant,
    completed: usize,
    total_latency: Duration,
    max_concurrency: usize,
    window: Option<LevelWindow>,
    level_efficiencies: Vec<f64>,
}

/// Accumulates task timings for throughput, latency and parallel efficiency.
///
/// `record` is called from concurrently completing tasks; all writes go
/// through one mutex.
#[derive(Debug)]
pub struct PerformanceTracker {
    inner: Mutex<TrackerState>,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerState {
                started: Instant::now(),
                completed: 0,
                total_latency: Duration::ZERO,
                max_concurrency: 0,
                window: None,
                level_efficiencies: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a measurement window for a level dispatched with `slots` concurrent slots.
    pub fn begin_level(&self, slots: usize) {
        self.state().window = Some(LevelWindow {
            started: Instant::now(),
            slots: slots.max(1),
            tasks: 0,
            busy: Duration::ZERO,
        });
    }

    /// Record one finished task.
    pub fn record(&self, duration: Duration, concurrency_at_start: usize) {
        let mut st = self.state();
        st.completed += 1;
        st.total_latency += duration;
        st.max_concurrency = st.max_concurrency.max(concurrency_at_start);
        if let Some(window) = st.window.as_mut() {
            window.tasks += 1;
            window.busy += duration;
        }
    }

    /// Close the current window.
    ///
    /// efficiency = busy / (wall × min(tasks, slots)). Returns `None` when
    /// no window was open or nothing ran in it.
    pub fn end_level(&self) -> Option<LevelMeasurement> {
        let mut st = self.state();
        let window = st.window.take()?;
        if window.tasks == 0 {
            return None;
        }

        let wall = window.started.elapsed();
        let width = window.tasks.min(window.slots);
        let efficiency = efficiency(window.busy, wall, width);
        st.level_efficiencies.push(efficiency);

        Some(LevelMeasurement {
            tasks: window.tasks,
            slots: window.slots,
            wall,
            busy: window.busy,
            efficiency,
        })
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let st = self.state();
        let elapsed = st.started.elapsed();

        let tasks_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            st.completed as f64 / elapsed.as_secs_f64()
        };
        let avg_latency = if st.completed == 0 {
            Duration::ZERO
        } else {
            st.total_latency / st.completed as u32
        };
        let mean_level_efficiency = if st.level_efficiencies.is_empty() {
            None
        } else {
            Some(st.level_efficiencies.iter().sum::<f64>() / st.level_efficiencies.len() as f64)
        };
        let parallel_efficiency = match st.level_efficiencies.last() {
            Some(&last) => last,
            None => efficiency(st.total_latency, elapsed, st.max_concurrency.max(1)),
        };

        PerformanceSnapshot {
            completed: st.completed,
            tasks_per_sec,
            avg_latency,
            parallel_efficiency,
            mean_level_efficiency,
            max_concurrency: st.max_concurrency,
        }
    }
}

fn efficiency(busy: Duration, wall: Duration, width: usize) -> f64 {
    if wall.is_zero() || width == 0 {
        return 1.0;
    }
    (busy.as_secs_f64() / (wall.as_secs_f64() * width as f64)).min(1.0)
}
