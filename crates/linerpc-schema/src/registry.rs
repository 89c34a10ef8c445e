use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_args;

/// File name suffix of schema files: `<channel>.schema.json`.
pub const SCHEMA_FILE_SUFFIX: &str = ".schema.json";

/// Channel-keyed registry of compiled JSON Schema validators.
///
/// A channel's schema describes the whole `args` array, e.g.
/// `{"type":"array","prefixItems":[{"type":"string"}],"minItems":1}`.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a schema for a channel from a JSON string.
    pub fn register(&mut self, channel: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(channel, &schema)
    }

    /// Register a schema for a channel from a JSON value.
    ///
    /// Replaces any schema already registered for the channel.
    pub fn register_value(&mut self, channel: &str, schema: &Value) -> Result<()> {
        let compiled = jsonschema::validator_for(schema)
            .map_err(|err| SchemaError::CompileFailed(format!("channel {channel:?}: {err}")))?;

        self.validators.insert(channel.to_string(), compiled);
        Ok(())
    }

    /// Load schemas from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load schemas from a directory with explicit config.
    ///
    /// Every regular file named `<channel>.schema.json` is loaded; other
    /// files are ignored. Symlinked schema files are refused.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            let Some(channel) = channel_from_file_name(&file_name) else {
                continue;
            };

            let entry_path = entry.path();
            let file_type = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?
                .file_type();

            if file_type.is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !file_type.is_file() {
                continue;
            }

            if registry.validators.len() >= registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({})",
                    registry.config.max_schemas_from_directory
                )));
            }

            let content = read_bounded(&entry_path, registry.config.max_schema_file_size)?;
            registry.register(channel, &content)?;
            debug!(channel, path = %entry_path.display(), "loaded channel schema");
        }

        Ok(registry)
    }

    /// Load from embedded `(channel, schema)` pairs.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (channel, schema) in schemas {
            registry.register(channel, schema)?;
        }
        Ok(registry)
    }

    /// Validate a channel's arguments against its schema.
    pub fn validate(&self, channel: &str, args: &[Value]) -> Result<()> {
        match self.validators.get(channel) {
            Some(validator) => validate_args(channel, args, validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(channel.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Check if a channel has a registered schema.
    pub fn has_schema(&self, channel: &str) -> bool {
        self.validators.contains_key(channel)
    }

    /// Channels that have registered schemas, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.validators.keys().cloned().collect();
        channels.sort_unstable();
        channels
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("channels", &self.channels())
            .field("config", &self.config)
            .finish()
    }
}

fn channel_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SCHEMA_FILE_SUFFIX)
        .filter(|channel| !channel.is_empty())
}

fn read_bounded(path: &Path, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
    })?;

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
        })?;

    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large (max {max_bytes} bytes): {}",
            path.display()
        )));
    }

    Ok(content)
}
