//! Warden admin console server
//!
//! Loads configuration, initialises tracing, builds the policy engine and
//! serves the administrative API behind the authorization middleware.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod startup;

pub use config::{ConfigError, ConfigLoader, ServerConfig};
pub use error::ApiError;
pub use startup::Server;
