pub mod config;
pub mod engine;
pub mod error;
pub mod model;

pub use error::{LifecycleError, Result};
