//! # fed-core
//!
//! Foundational pieces shared by the federation crates:
//!
//! - [`audit`] - security audit events and the sinks that receive them
//! - [`config`] - TOML configuration loading
//! - [`error`] - error types for the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod config;
pub mod error;

pub use audit::{AuditEvent, AuditEventType, AuditLevel, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use error::{ConfigError, ConfigResult};
