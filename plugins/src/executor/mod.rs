pub mod command;
pub mod renderers;
pub mod retrying;
pub mod strategies;
pub mod subplan;

pub use command::CommandExecutor;
pub use renderers::{JsonlRenderer, TextRenderer};
pub use retrying::RetryingExecutor;
pub use strategies::{ExponentialBackoff, LinearRetry};
pub use subplan::SubPlanExecutor;
