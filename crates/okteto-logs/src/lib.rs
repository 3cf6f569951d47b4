//! Remote log streaming for okteto
//!
//! This crate follows deploy and destroy logs served by the Okteto API,
//! retrying dropped connections with capped exponential backoff.

mod backoff;
mod parser;
mod stream;

pub use backoff::{RetryError, RetryableError, calculate_exponential_backoff, stream_with_backoff};
pub use parser::LogParser;
pub use stream::{LogSource, LogStreamManager};

// Re-export types used in our public API
pub use okteto_types::{LogEntry, LogLevel};
