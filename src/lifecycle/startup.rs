//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration exactly once
//! - Log what the gateway is about to run with
//! - Return a shareable handle for the subsystems
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal
//! - The config is passed explicitly, never stored in a global

use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigError, ConfigLoader, GatewayConfig};

/// Load the configuration at `path` and log its summary.
pub fn bootstrap(path: &Path, loader: &ConfigLoader) -> Result<Arc<GatewayConfig>, ConfigError> {
    let config = loader.load(path).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Refusing to start with invalid configuration");
    })?;

    log_summary(&config);
    Ok(Arc::new(config))
}

/// Emit one structured event per section.
pub fn log_summary(config: &GatewayConfig) {
    let protocols: Vec<String> = config
        .dewpoint
        .protocols
        .iter()
        .map(|b| format!("{:?}={}", b.scheme, b.protocol))
        .collect();

    tracing::info!(
        protocols = ?protocols,
        log_level = %config.dewpoint.log_level,
        log_id = %config.dewpoint.log_id,
        log_facility = %config.dewpoint.log_facility,
        input_block = config.dewpoint.input_stream_block_size,
        output_block = config.dewpoint.output_stream_block_size,
        "Gateway settings"
    );
    tracing::info!(
        backend = %config.storage.name,
        program = %config.storage.program(),
        args = ?config.storage.args(),
        enable_fuse = config.storage.enable_fuse,
        enterprise_number = config.storage.enterprise_number,
        "Storage backend"
    );
    tracing::info!(
        plugins = ?config.cdmi.plugins,
        default_version = %config.cdmi.default_version,
        value_transfer_maxsize = config.cdmi.value_transfer_maxsize,
        "CDMI protocol"
    );
    tracing::info!(
        bind = %config.fcgx.bind_target(),
        backlog = config.fcgx.backlog,
        n_responders = config.fcgx.n_responders,
        "FastCGI listener"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bootstrap_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = bootstrap(&dir.path().join("dewpoint.js"), &ConfigLoader::new()).unwrap_err();
        assert!(matches!(err, ConfigError::IoFailure { .. }));
    }

    #[test]
    fn test_bootstrap_shares_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[dewpoint]
protocols = [{{ "" = "cdmi" }}]
storage = "sofs"
log_onerror = 1
log_level = "debug"
log_id = "dewpoint"
log_facility = "local5"
debug_mask = "NONE"
input_stream_block_size = 4096
output_stream_block_size = 4096

[sofs]
command = ["sofs"]
enable_fuse = false
enterprise_number = 1

[cdmi]
plugins = []
default_version = "1.1"
value_transfer_maxsize = 1024

[fcgx]
bind_addr = ""
port = 9000
backlog = 16
n_responders = 2
"#
        )
        .unwrap();

        let config = bootstrap(file.path(), &ConfigLoader::new()).unwrap();
        let worker_view = Arc::clone(&config);
        assert_eq!(worker_view.fcgx.port, 9000);
        assert!(worker_view.cdmi.plugins.is_empty());
        assert_eq!(Arc::strong_count(&config), 2);
    }
}
