//! Configuration loading for the dewpoint CDMI gateway.

pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{load_config, ConfigError, ConfigLoader, GatewayConfig};
