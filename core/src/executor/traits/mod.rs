pub mod decomposer;
pub mod executor;
pub mod observer;
pub mod strategy;

pub use decomposer::*;
pub use executor::*;
pub use observer::*;
pub use strategy::*;
