//! # s6dash-core
//!
//! Core types, errors, and supervisor access for s6dash.
//!
//! This crate provides:
//! - [`DashError`] - Error type for all s6dash operations
//! - [`logging`] - Tracing setup
//! - [`registry`] - Discovery of service directories
//! - [`supervisor`] - The [`Supervisor`] seam and its s6 implementation
//! - [`follow`] - Following a rotating log file line by line
//! - [`signal`] - The key-to-signal table
//!
//! ## Example
//!
//! ```no_run
//! use s6dash_core::{S6Supervisor, ServiceRegistry, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> s6dash_core::Result<()> {
//!     let registry = ServiceRegistry::scan("/run/service")?;
//!     let supervisor = S6Supervisor::new();
//!     for service in registry.services().iter() {
//!         match supervisor.query_status(service).await {
//!             Ok(status) => println!("{service}: up={}", status.up),
//!             Err(e) => println!("{service}: {e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod follow;
pub mod logging;
pub mod registry;
pub mod signal;
pub mod supervisor;
pub mod types;

// Re-export main types for convenience
pub use error::{DashError, Result};
pub use follow::{FileFollower, FollowConfig, LineStream};
pub use logging::{LogGuard, init_logging};
pub use registry::{ServiceRegistry, list_services};
pub use signal::{SIGNAL_KEYS, Signal, signal_for_key};
pub use supervisor::{LogLocator, S6Supervisor, Supervisor};
pub use types::{ControlAction, ServiceRef, StatusOutcome, StatusRecord};
