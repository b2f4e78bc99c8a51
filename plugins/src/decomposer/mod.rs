pub mod file;

pub use file::{FileDecomposer, PlanFile};
