pub mod retry;

pub use retry::{ExponentialBackoff, LinearRetry};
