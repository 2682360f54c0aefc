//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON, or TOML by extension)
//!     → loader.rs (bounded read & parse into a generic tree)
//!     → validation.rs (typed extraction, ranges, references)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Tooling:
//!     render.rs turns a GatewayConfig back into a document
//!     watcher.rs re-validates the file whenever it changes
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no global instance
//! - The storage section is resolved by name through `dewpoint.storage`
//! - Unknown keys warn by default and fail under the strict policy

pub mod loader;
pub mod render;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError, ConfigLoader, Format, UnknownKeyPolicy};
pub use schema::{
    DewpointSection, GatewayConfig, ListenerSection, LogLevel, ProtocolBinding, ProtocolSection,
    ProtocolVersion, StorageSection,
};
