pub mod config;
pub mod goal;
pub mod result;
pub mod task;
pub mod timeline;

pub use config::*;
pub use goal::*;
pub use result::*;
pub use task::*;
pub use timeline::*;
