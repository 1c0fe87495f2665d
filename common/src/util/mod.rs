pub mod cancel;
pub mod check;
pub mod config;
pub mod generator;
pub mod logger;
pub mod profiler;
pub mod visualization;

pub use cancel::CancellationToken;
pub use config::{OptimizerConfig, RouterConfig};
