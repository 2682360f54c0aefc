//! Configuration schema definitions.
//!
//! This module defines the typed shape of the gateway configuration document.
//! Values are only constructed by the validation layer, so every instance
//! already satisfies the range and reference checks.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Root configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Protocol bindings, backend selector, logging and stream sizes.
    pub dewpoint: DewpointSection,

    /// Storage backend section resolved through `dewpoint.storage`.
    pub storage: StorageSection,

    /// CDMI protocol settings.
    pub cdmi: ProtocolSection,

    /// FastCGI listener settings.
    pub fcgx: ListenerSection,

    /// Sections of protocols bound in `dewpoint.protocols` other than CDMI,
    /// kept verbatim for the plugins that implement them.
    pub protocol_sections: BTreeMap<String, Value>,
}

impl GatewayConfig {
    /// Name of the active storage backend section.
    pub fn storage_name(&self) -> &str {
        &self.dewpoint.storage
    }
}

/// Core gateway section (`dewpoint`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DewpointSection {
    /// Ordered protocol bindings.
    pub protocols: Vec<ProtocolBinding>,

    /// Key of the storage section implementing the active backend.
    pub storage: String,

    /// Error count threshold before log flushing.
    pub log_onerror: u32,

    /// Minimum severity logged by the gateway.
    pub log_level: LogLevel,

    /// Syslog identifier.
    pub log_id: String,

    /// Syslog facility (e.g. `local5`).
    pub log_facility: String,

    /// Debug subsystem mask (`NONE` disables debug output).
    pub debug_mask: String,

    /// Block size for request bodies streamed into storage.
    pub input_stream_block_size: u64,

    /// Block size for response bodies streamed out of storage.
    pub output_stream_block_size: u64,
}

/// A single `{ "<scheme>": "<protocol>" }` entry of `dewpoint.protocols`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolBinding {
    /// URL scheme or prefix; empty binds the protocol to the root.
    pub scheme: String,

    /// Protocol name, which is also the key of its settings section.
    pub protocol: String,
}

impl Serialize for ProtocolBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.scheme, &self.protocol)?;
        map.end()
    }
}

/// Storage backend section, keyed by the selector in `dewpoint.storage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSection {
    /// Section key this backend was resolved from.
    #[serde(skip)]
    pub name: String,

    /// Backend invocation: executable followed by its arguments.
    pub command: Vec<String>,

    /// Expose the backend through FUSE.
    pub enable_fuse: bool,

    /// IANA private enterprise number used in backend identifiers.
    pub enterprise_number: u32,
}

impl StorageSection {
    /// Executable to launch.
    pub fn program(&self) -> &str {
        // validation guarantees a non-empty command
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

/// CDMI protocol section (`cdmi`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolSection {
    /// Plugins loaded in order.
    pub plugins: Vec<String>,

    /// Version advertised when a client does not ask for one.
    pub default_version: ProtocolVersion,

    /// Largest value transferred in a single request, in bytes.
    pub value_transfer_maxsize: u64,
}

/// FastCGI listener section (`fcgx`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerSection {
    /// Bind address; empty means all interfaces.
    pub bind_addr: String,

    /// TCP port.
    pub port: u16,

    /// Pending connection queue depth.
    pub backlog: u32,

    /// Number of responder threads.
    pub n_responders: u32,
}

impl ListenerSection {
    /// IP address to bind, `None` when `bind_addr` is a host name.
    pub fn bind_ip(&self) -> Option<IpAddr> {
        if self.bind_addr.is_empty() {
            return Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        self.bind_addr.parse().ok()
    }

    /// `host:port` string suitable for a resolver.
    pub fn bind_target(&self) -> String {
        match self.bind_ip() {
            Some(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            Some(ip) => format!("{}:{}", ip, self.port),
            None => format!("{}:{}", self.bind_addr, self.port),
        }
    }
}

/// Syslog-style severity used by `dewpoint.log_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Emerg,
    Alert,
    Crit,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    /// Canonical spelling written back to documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Emerg => "emerg",
            LogLevel::Alert => "alert",
            LogLevel::Crit => "crit",
            LogLevel::Error => "err",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Equivalent `tracing` filter directive.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Emerg | LogLevel::Alert | LogLevel::Crit | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Notice | LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "emerg" => Ok(LogLevel::Emerg),
            "alert" => Ok(LogLevel::Alert),
            "crit" => Ok(LogLevel::Crit),
            "err" | "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "notice" => Ok(LogLevel::Notice),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!(
                "unknown log level `{}` (expected one of emerg, alert, crit, err, warning, notice, info, debug)",
                other
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Dotted numeric version such as `1.0.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    components: Vec<u32>,
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(format!("`{}` has more than three components", s));
        }

        let components = parts
            .iter()
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(format!("`{}` is not a dotted numeric version", s));
                }
                p.parse::<u32>()
                    .map_err(|_| format!("component `{}` of `{}` is too large", p, s))
            })
            .collect::<Result<Vec<u32>, String>>()?;

        Ok(Self { components })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
