//! Core utilities: configuration, errors, logging, error sink

pub mod config;
pub mod error;
pub mod error_logger;
pub mod logging;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use error_logger::{DbErrorSink, ErrorSink};
pub use logging::init_logger;
