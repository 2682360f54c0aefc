//! Rendering a loaded configuration back into document form.
//!
//! The output has the same shape the loader accepts, with the storage
//! section written under its selector key and every additional protocol
//! section written back verbatim, so `load(render(c)) == c`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{CDMI_SECTION, DEWPOINT_SECTION, FCGX_SECTION};

/// Error type for rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization failed: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// Convert the configuration to a generic document tree.
pub fn to_value(config: &GatewayConfig) -> Result<Value, RenderError> {
    let mut root = Map::new();
    root.insert(DEWPOINT_SECTION.to_string(), serde_json::to_value(&config.dewpoint)?);
    root.insert(config.storage.name.clone(), serde_json::to_value(&config.storage)?);
    root.insert(CDMI_SECTION.to_string(), serde_json::to_value(&config.cdmi)?);
    root.insert(FCGX_SECTION.to_string(), serde_json::to_value(&config.fcgx)?);
    for (name, section) in &config.protocol_sections {
        root.insert(name.clone(), section.clone());
    }
    Ok(Value::Object(root))
}

/// Pretty-printed JSON document.
pub fn to_json_string(config: &GatewayConfig) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(&to_value(config)?)?)
}

/// TOML document with one table per section.
pub fn to_toml_string(config: &GatewayConfig) -> Result<String, RenderError> {
    Ok(toml::to_string(&to_value(config)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::loader::{ConfigLoader, Format};
    use crate::config::validation::MAX_PORTABLE_INT;
    use crate::config::schema::{
        DewpointSection, ListenerSection, LogLevel, ProtocolBinding, ProtocolSection,
        StorageSection,
    };

    fn sample() -> GatewayConfig {
        GatewayConfig {
            dewpoint: DewpointSection {
                protocols: vec![
                    ProtocolBinding { scheme: String::new(), protocol: "cdmi".into() },
                ],
                storage: "sofs".into(),
                log_onerror: 0,
                log_level: LogLevel::Notice,
                log_id: "dewpoint".into(),
                log_facility: "local5".into(),
                debug_mask: "NONE".into(),
                input_stream_block_size: 131072,
                output_stream_block_size: 65536,
            },
            storage: StorageSection {
                name: "sofs".into(),
                command: vec!["sofs".into(), "-T".into(), "3".into()],
                enable_fuse: false,
                enterprise_number: 37489,
            },
            cdmi: ProtocolSection {
                plugins: vec!["scality_extensions".into()],
                default_version: "1.0".parse().unwrap(),
                value_transfer_maxsize: 1048576,
            },
            fcgx: ListenerSection {
                bind_addr: "127.0.0.1".into(),
                port: 1039,
                backlog: 0,
                n_responders: 4,
            },
            protocol_sections: Default::default(),
        }
    }

    fn with_s3_binding() -> GatewayConfig {
        let mut config = sample();
        config.dewpoint.protocols.push(ProtocolBinding {
            scheme: "s3".into(),
            protocol: "s3".into(),
        });
        config
            .protocol_sections
            .insert("s3".into(), json!({ "port": 8000, "signature": { "version": 4 } }));
        config
    }

    #[test]
    fn test_value_shape() {
        let value = to_value(&sample()).unwrap();
        assert_eq!(value["dewpoint"]["protocols"][0][""], "cdmi");
        assert_eq!(value["dewpoint"]["log_level"], "notice");
        assert_eq!(value["sofs"]["command"][1], "-T");
        assert!(value["sofs"].get("name").is_none());
        assert_eq!(value["cdmi"]["default_version"], "1.0");
        assert_eq!(value["fcgx"]["port"], 1039);
    }

    #[test]
    fn test_json_reload_is_identical() {
        let config = sample();
        let text = to_json_string(&config).unwrap();
        let reloaded = ConfigLoader::new().load_str(&text, Format::Json).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_toml_reload_is_identical() {
        let config = sample();
        let text = to_toml_string(&config).unwrap();
        assert!(text.contains("[fcgx]"));
        let reloaded = ConfigLoader::new().load_str(&text, Format::Toml).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_additional_protocol_reloads_in_both_formats() {
        let config = with_s3_binding();
        let loader = ConfigLoader::new();

        let json = to_json_string(&config).unwrap();
        assert_eq!(loader.load_str(&json, Format::Json).unwrap(), config);

        let toml = to_toml_string(&config).unwrap();
        assert_eq!(loader.load_str(&toml, Format::Toml).unwrap(), config);
    }

    #[test]
    fn test_largest_sizes_render_as_toml() {
        let mut config = sample();
        config.dewpoint.input_stream_block_size = MAX_PORTABLE_INT;
        config.dewpoint.output_stream_block_size = MAX_PORTABLE_INT;
        config.cdmi.value_transfer_maxsize = MAX_PORTABLE_INT;

        let toml = to_toml_string(&config).unwrap();
        let reloaded = ConfigLoader::new().load_str(&toml, Format::Toml).unwrap();
        assert_eq!(reloaded, config);
    }
}
