pub mod decomposer;
pub mod executor;
pub mod factory;
