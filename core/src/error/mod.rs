pub mod executor;
pub mod validation;

pub use executor::{PlanError, TaskExecutionError};
pub use validation::ValidationError;
