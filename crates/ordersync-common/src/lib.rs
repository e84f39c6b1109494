//! ordersync common library
//!
//! Shared plumbing for the ordersync workspace members:
//!
//! - **Error Handling**: error type for the shared setup code
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use ordersync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> ordersync_common::Result<()> {
//!     let config = LogConfig::default().with_env_overrides()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
