//! Configuration loading from disk.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::validate_document;

/// Default upper bound on the size of a configuration file.
pub const DEFAULT_MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exceeds the configured size limit.
    #[error("{} exceeds the {limit} byte configuration size limit", .path.display())]
    FileTooLarge { path: PathBuf, limit: u64 },

    /// The document is not well-formed.
    #[error("parse error{}: {message}", location(.line, .column))]
    ParseFailure {
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// A field has the wrong type or is out of range.
    #[error("invalid value for `{0}`: {1}")]
    InvalidValue(String, String),

    /// A field names a section that does not exist.
    #[error("`{0}` does not name a section of the document")]
    UnresolvedReference(String),

    /// A key not known to the schema, under [`UnknownKeyPolicy::Reject`].
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(l), Some(c)) => format!(" at line {} column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        _ => String::new(),
    }
}

impl ConfigError {
    /// Dotted path of the offending field, when the error concerns one.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            ConfigError::MissingField(path)
            | ConfigError::InvalidValue(path, _)
            | ConfigError::UnknownField(path) => Some(path),
            _ => None,
        }
    }
}

/// How keys absent from the schema are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Log a warning and ignore the key.
    #[default]
    Warn,
    /// Fail with [`ConfigError::UnknownField`].
    Reject,
}

/// Syntax of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// Pick the format from a file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

/// Reads, parses and validates gateway configuration documents.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    unknown_keys: UnknownKeyPolicy,
    max_size: u64,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            unknown_keys: UnknownKeyPolicy::default(),
            max_size: DEFAULT_MAX_CONFIG_SIZE,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unknown key policy.
    pub fn unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Set the maximum accepted file size in bytes.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Load and validate the configuration stored at `path`.
    pub fn load(&self, path: &Path) -> Result<GatewayConfig, ConfigError> {
        let content = self.read_bounded(path)?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Configuration file read");

        let config = self.load_str(&content, Format::from_path(path))?;

        tracing::info!(
            path = %path.display(),
            storage = %config.storage_name(),
            port = config.fcgx.port,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate an in-memory document.
    pub fn load_str(&self, content: &str, format: Format) -> Result<GatewayConfig, ConfigError> {
        let tree = parse_tree(content, format)?;
        validate_document(&tree, self.unknown_keys)
    }

    fn read_bounded(&self, path: &Path) -> Result<String, ConfigError> {
        let io_err = |source| ConfigError::IoFailure {
            path: path.to_path_buf(),
            source,
        };
        let too_large = || ConfigError::FileTooLarge {
            path: path.to_path_buf(),
            limit: self.max_size,
        };

        let file = File::open(path).map_err(io_err)?;
        if file.metadata().map_err(io_err)?.len() > self.max_size {
            return Err(too_large());
        }

        // The metadata length can be stale for pipes and procfs; cap the read too.
        let mut content = String::new();
        file.take(self.max_size.saturating_add(1))
            .read_to_string(&mut content)
            .map_err(io_err)?;
        if content.len() as u64 > self.max_size {
            return Err(too_large());
        }
        Ok(content)
    }
}

/// Load and validate configuration with the default loader settings.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    ConfigLoader::new().load(path)
}

/// Parse a document into a generic tree of mappings, sequences and scalars.
pub fn parse_tree(content: &str, format: Format) -> Result<Value, ConfigError> {
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| ConfigError::ParseFailure {
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        }),
        Format::Toml => toml::from_str(content).map_err(|e: toml::de::Error| {
            let (line, column) = match e.span() {
                Some(span) => {
                    let (l, c) = line_column(content, span.start);
                    (Some(l), Some(c))
                }
                None => (None, None),
            };
            ConfigError::ParseFailure {
                line,
                column,
                message: e.message().to_string(),
            }
        }),
    }
}

/// One-based line and column of a byte offset.
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let prefix = content.get(..offset).unwrap_or(content);
    let line = prefix.matches('\n').count() + 1;
    let column = prefix
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count())
        .unwrap_or(0)
        + 1;
    (line, column)
}
