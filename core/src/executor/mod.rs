//! Goal-oriented plan execution over a task dependency graph (DAG)
//!
//! This module turns a validated [`Plan`] into a [`PlanResult`]:
//! - Task graph construction and validation (ids, dependencies, cycles, nesting limits)
//! - Topological ordering and dependency levels
//! - Sequential, bounded-parallel and adaptive dispatch behind one concurrency gate
//! - Goal evaluation with early termination
//! - Transitive failure propagation, plan timeout and cancellation
//!
//! # Architecture
//!
//! ```text
//! PlanBuilder (tasks, edges, strategy, limits, goal)
//!   ↓
//! PlanBuilder::build() → TaskGraph::build() → detect_cycle(), limits
//!   ↓
//! Plan { graph, strategy, goal_state, config }
//!   ↓
//! Schedule::compute() → topological order + dependency levels
//!   ↓
//! ExecutionEngine::execute() → PlanRun::drive()
//!   │   ConcurrencyGate · TaskExecutor · PerformanceTracker
//!   │   StrategySelector (adaptive) · GoalEvaluator (sync point)
//!   ↓
//! PlanResult { status, tasks, metrics, timeline }
//! ```

mod engine;
mod gate;
pub mod goal;
mod graph;
mod perf;
mod plan;
mod progress;
mod run;
mod scheduler;
mod strategy;
pub mod traits;
pub mod types;

pub use engine::{execute_plan, ExecutionEngine, ExecutionEngineBuilder};
pub use gate::{ConcurrencyGate, GatePermit};
pub use goal::GoalEvaluation;
pub use graph::{GraphLimits, TaskGraph};
pub use perf::{LevelMeasurement, PerformanceSnapshot, PerformanceTracker};
pub use plan::{Plan, PlanBuilder};
pub use progress::ProgressMonitor;
pub use scheduler::{dependency_levels, topological_order, Schedule};
pub use strategy::{Decision, DispatchMode, StrategySelector};
