//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Log summary → Hand out Arc<GatewayConfig>
//! ```
//!
//! # Design Decisions
//! - Configuration loads first; nothing starts on a bad config
//! - Startup errors are fatal and never retried

pub mod startup;
