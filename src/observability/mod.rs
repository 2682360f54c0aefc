//! Observability subsystem.
//!
//! Structured logging through `tracing`. The default level comes from the
//! configuration's `log_level`; `RUST_LOG` overrides it.

pub mod logging;
