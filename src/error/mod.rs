//! Error types for the executor.
//!
//! - [`ExecutorError`] — Errors raised while handling one request or while
//!   loading the graph at startup.

pub mod executor_error;

pub use executor_error::ExecutorError;

/// Convenience alias for executor-level results.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
