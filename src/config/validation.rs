//! Configuration validation.
//!
//! # Responsibilities
//! - Extract typed sections from the generic document tree
//! - Validate value ranges (ports, block sizes, responder counts)
//! - Resolve references (storage selector, protocol bindings) to sections
//! - Apply the unknown key policy
//!
//! # Design Decisions
//! - Fails on the first error, naming the field by its dotted path
//! - Validation is a pure function of the tree and the policy
//! - Runs before config is handed to any subsystem

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::ops::RangeInclusive;

use serde_json::{Map, Value};

use crate::config::loader::{ConfigError, UnknownKeyPolicy};
use crate::config::schema::{
    DewpointSection, GatewayConfig, ListenerSection, LogLevel, ProtocolBinding, ProtocolSection,
    ProtocolVersion, StorageSection,
};

pub const DEWPOINT_SECTION: &str = "dewpoint";
pub const CDMI_SECTION: &str = "cdmi";
pub const FCGX_SECTION: &str = "fcgx";

/// Largest integer accepted for unbounded sizes; TOML integers are signed 64-bit.
pub const MAX_PORTABLE_INT: u64 = i64::MAX as u64;

/// Build a [`GatewayConfig`] from a parsed document tree.
pub fn validate_document(
    tree: &Value,
    policy: UnknownKeyPolicy,
) -> Result<GatewayConfig, ConfigError> {
    let root = tree.as_object().ok_or_else(|| {
        ConfigError::InvalidValue(
            "(root)".to_string(),
            format!("expected a mapping, found {}", kind(tree)),
        )
    })?;

    let dewpoint = parse_dewpoint(&section(root, DEWPOINT_SECTION)?, policy)?;

    // The storage section is only known through the selector.
    let storage_value = root
        .get(&dewpoint.storage)
        .ok_or_else(|| ConfigError::UnresolvedReference(dewpoint.storage.clone()))?;
    let storage = parse_storage(
        &Fields::new(dewpoint.storage.clone(), storage_value)?,
        policy,
    )?;

    let cdmi = parse_cdmi(&section(root, CDMI_SECTION)?, policy)?;
    let fcgx = parse_fcgx(&section(root, FCGX_SECTION)?, policy)?;

    let mut protocol_sections = BTreeMap::new();
    for (i, binding) in dewpoint.protocols.iter().enumerate() {
        let name = binding.protocol.as_str();
        if name == CDMI_SECTION {
            continue;
        }
        if name == DEWPOINT_SECTION || name == FCGX_SECTION || name == dewpoint.storage {
            return Err(ConfigError::InvalidValue(
                format!("{}.protocols[{}]", DEWPOINT_SECTION, i),
                format!("`{}` is not a protocol section", name),
            ));
        }
        let value = root
            .get(name)
            .ok_or_else(|| ConfigError::UnresolvedReference(name.to_string()))?;
        Fields::new(name.to_string(), value)?;
        check_portable(name, value)?;
        protocol_sections.insert(name.to_string(), value.clone());
    }

    let mut known: BTreeSet<&str> = [DEWPOINT_SECTION, CDMI_SECTION, FCGX_SECTION]
        .into_iter()
        .collect();
    known.insert(&dewpoint.storage);
    for binding in &dewpoint.protocols {
        known.insert(&binding.protocol);
    }
    for key in root.keys() {
        if !known.contains(key.as_str()) {
            unknown_key(key.clone(), policy)?;
        }
    }

    Ok(GatewayConfig {
        dewpoint,
        storage,
        cdmi,
        fcgx,
        protocol_sections,
    })
}

/// Reject values that cannot be written back in both document formats.
fn check_portable(path: &str, value: &Value) -> Result<(), ConfigError> {
    match value {
        Value::Null => Err(ConfigError::InvalidValue(
            path.to_string(),
            "null cannot be represented in every configuration format".to_string(),
        )),
        Value::Number(n) if n.as_u64().is_some_and(|n| n > MAX_PORTABLE_INT) => {
            Err(ConfigError::InvalidValue(
                path.to_string(),
                format!("{} exceeds the largest portable integer {}", n, MAX_PORTABLE_INT),
            ))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_portable(&format!("{}[{}]", path, i), item)),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(key, item)| check_portable(&format!("{}.{}", path, key), item)),
        _ => Ok(()),
    }
}

fn section<'a>(root: &'a Map<String, Value>, name: &str) -> Result<Fields<'a>, ConfigError> {
    let value = root
        .get(name)
        .ok_or_else(|| ConfigError::MissingField(name.to_string()))?;
    Fields::new(name.to_string(), value)
}

fn parse_dewpoint(
    fields: &Fields<'_>,
    policy: UnknownKeyPolicy,
) -> Result<DewpointSection, ConfigError> {
    let protocols = fields
        .array("protocols")?
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_binding(&fields.index_path("protocols", i), entry))
        .collect::<Result<Vec<_>, _>>()?;
    if protocols.is_empty() {
        return Err(fields.invalid("protocols", "at least one protocol binding is required"));
    }

    let storage = fields.string("storage")?;
    if storage.is_empty() {
        return Err(fields.invalid("storage", "must name a storage section"));
    }
    if [DEWPOINT_SECTION, CDMI_SECTION, FCGX_SECTION].contains(&storage.as_str()) {
        return Err(fields.invalid(
            "storage",
            format!("`{}` is a reserved section, not a storage backend", storage),
        ));
    }

    let log_level = fields
        .string("log_level")?
        .parse::<LogLevel>()
        .map_err(|reason| fields.invalid("log_level", reason))?;

    let dewpoint = DewpointSection {
        protocols,
        storage,
        log_onerror: fields.u32_in("log_onerror", 0..=u32::MAX)?,
        log_level,
        log_id: fields.string("log_id")?,
        log_facility: fields.string("log_facility")?,
        debug_mask: fields.string("debug_mask")?,
        input_stream_block_size: fields.u64_in("input_stream_block_size", 1..=MAX_PORTABLE_INT)?,
        output_stream_block_size: fields.u64_in("output_stream_block_size", 1..=MAX_PORTABLE_INT)?,
    };
    fields.finish(
        &[
            "protocols",
            "storage",
            "log_onerror",
            "log_level",
            "log_id",
            "log_facility",
            "debug_mask",
            "input_stream_block_size",
            "output_stream_block_size",
        ],
        policy,
    )?;
    Ok(dewpoint)
}

fn parse_binding(path: &str, entry: &Value) -> Result<ProtocolBinding, ConfigError> {
    let map = entry.as_object().ok_or_else(|| {
        ConfigError::InvalidValue(
            path.to_string(),
            format!("expected a single-entry mapping, found {}", kind(entry)),
        )
    })?;

    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((scheme, Value::String(protocol))), None) => Ok(ProtocolBinding {
            scheme: scheme.clone(),
            protocol: protocol.clone(),
        }),
        (Some((scheme, other)), None) => Err(ConfigError::InvalidValue(
            format!("{}.{}", path, scheme),
            format!("expected a protocol name, found {}", kind(other)),
        )),
        _ => Err(ConfigError::InvalidValue(
            path.to_string(),
            format!("expected exactly one scheme, found {}", map.len()),
        )),
    }
}

fn parse_storage(
    fields: &Fields<'_>,
    policy: UnknownKeyPolicy,
) -> Result<StorageSection, ConfigError> {
    let command = fields.string_list("command")?;
    match command.first() {
        None => return Err(fields.invalid("command", "must contain at least the executable")),
        Some(argv0) if argv0.is_empty() => {
            return Err(fields.invalid("command[0]", "executable must not be empty"))
        }
        Some(_) => {}
    }

    let storage = StorageSection {
        name: fields.path.clone(),
        command,
        enable_fuse: fields.boolean("enable_fuse")?,
        enterprise_number: fields.u32_in("enterprise_number", 0..=u32::MAX)?,
    };
    fields.finish(&["command", "enable_fuse", "enterprise_number"], policy)?;
    Ok(storage)
}

fn parse_cdmi(
    fields: &Fields<'_>,
    policy: UnknownKeyPolicy,
) -> Result<ProtocolSection, ConfigError> {
    let plugins = fields.string_list("plugins")?;
    if let Some(i) = plugins.iter().position(String::is_empty) {
        return Err(fields.invalid(&format!("plugins[{}]", i), "plugin name must not be empty"));
    }

    let default_version = fields
        .string("default_version")?
        .parse::<ProtocolVersion>()
        .map_err(|reason| fields.invalid("default_version", reason))?;

    let cdmi = ProtocolSection {
        plugins,
        default_version,
        value_transfer_maxsize: fields.u64_in("value_transfer_maxsize", 1..=MAX_PORTABLE_INT)?,
    };
    fields.finish(
        &["plugins", "default_version", "value_transfer_maxsize"],
        policy,
    )?;
    Ok(cdmi)
}

fn parse_fcgx(
    fields: &Fields<'_>,
    policy: UnknownKeyPolicy,
) -> Result<ListenerSection, ConfigError> {
    let bind_addr = fields.string("bind_addr")?;
    if !bind_addr.is_empty() && bind_addr.parse::<IpAddr>().is_err() && !is_hostname(&bind_addr) {
        return Err(fields.invalid(
            "bind_addr",
            format!("`{}` is neither an IP address nor a host name", bind_addr),
        ));
    }

    let port = fields.u64_in("port", 1..=u16::MAX as u64)? as u16;

    let fcgx = ListenerSection {
        bind_addr,
        port,
        backlog: fields.u32_in("backlog", 0..=u32::MAX)?,
        n_responders: fields.u32_in("n_responders", 1..=u32::MAX)?,
    };
    fields.finish(&["bind_addr", "port", "backlog", "n_responders"], policy)?;
    Ok(fcgx)
}

fn is_hostname(s: &str) -> bool {
    s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

fn unknown_key(path: String, policy: UnknownKeyPolicy) -> Result<(), ConfigError> {
    match policy {
        UnknownKeyPolicy::Warn => {
            tracing::warn!(field = %path, "Ignoring unknown configuration field");
            Ok(())
        }
        UnknownKeyPolicy::Reject => Err(ConfigError::UnknownField(path)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// A mapping node together with its dotted path, for typed field access.
struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(path: String, value: &'a Value) -> Result<Self, ConfigError> {
        match value.as_object() {
            Some(map) => Ok(Self { path, map }),
            None => Err(ConfigError::InvalidValue(
                path,
                format!("expected a mapping, found {}", kind(value)),
            )),
        }
    }

    fn field_path(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    fn index_path(&self, key: &str, index: usize) -> String {
        format!("{}.{}[{}]", self.path, key, index)
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue(self.field_path(key), reason.into())
    }

    fn required(&self, key: &str) -> Result<&'a Value, ConfigError> {
        self.map
            .get(key)
            .ok_or_else(|| ConfigError::MissingField(self.field_path(key)))
    }

    fn string(&self, key: &str) -> Result<String, ConfigError> {
        match self.required(key)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.invalid(key, format!("expected a string, found {}", kind(other)))),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool, ConfigError> {
        match self.required(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.invalid(key, format!("expected a boolean, found {}", kind(other)))),
        }
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Value>, ConfigError> {
        match self.required(key)? {
            Value::Array(items) => Ok(items),
            other => Err(self.invalid(key, format!("expected a sequence, found {}", kind(other)))),
        }
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ConfigError::InvalidValue(
                    self.index_path(key, i),
                    format!("expected a string, found {}", kind(other)),
                )),
            })
            .collect()
    }

    fn u64_in(&self, key: &str, range: RangeInclusive<u64>) -> Result<u64, ConfigError> {
        let value = self.required(key)?;
        let n = match value {
            Value::Number(n) => n,
            other => {
                return Err(self.invalid(key, format!("expected an integer, found {}", kind(other))))
            }
        };

        let n = match (n.as_u64(), n.as_i64()) {
            (Some(n), _) => n,
            (None, Some(negative)) => {
                return Err(self.invalid(key, format!("{} is negative", negative)))
            }
            (None, None) => return Err(self.invalid(key, format!("{} is not an integer", n))),
        };

        if !range.contains(&n) {
            return Err(self.invalid(
                key,
                format!(
                    "{} is out of range (must be between {} and {})",
                    n,
                    range.start(),
                    range.end()
                ),
            ));
        }
        Ok(n)
    }

    fn u32_in(&self, key: &str, range: RangeInclusive<u32>) -> Result<u32, ConfigError> {
        let (start, end) = range.into_inner();
        self.u64_in(key, start as u64..=end as u64).map(|n| n as u32)
    }

    /// Apply the unknown key policy to keys outside `known`.
    fn finish(&self, known: &[&str], policy: UnknownKeyPolicy) -> Result<(), ConfigError> {
        for key in self.map.keys() {
            if !known.contains(&key.as_str()) {
                unknown_key(self.field_path(key), policy)?;
            }
        }
        Ok(())
    }
}
