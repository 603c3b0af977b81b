//! Values handling with deep merge support
//!
//! The render context ("locals") is a single JSON mapping built by layering
//! sources on top of each other with [`ValueBuilder`]. Later sources win:
//!
//! 1. configuration defaults, OS facts, package identity and volume paths
//! 2. the package's `values.yaml` (or its override)
//! 3. caller supplied value files, in the order given
//! 4. `--set` overrides
//! 5. resolved secrets
//!
//! Mappings merge key by key; scalars and sequences are replaced wholesale.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::path::Path;

use crate::config::AftConfig;
use crate::error::{CoreError, Result, read_to_string};
use crate::package::PackageSpec;

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load a value file, JSON when the extension is `.json`, YAML otherwise
    ///
    /// The document must be a mapping. An empty document is an empty mapping.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };

        let values = parsed.map_err(|e| CoreError::parse(path, e.to_string()))?;
        match values.0 {
            JsonValue::Object(_) => Ok(values),
            JsonValue::Null => Ok(Self::new()),
            other => Err(CoreError::parse(
                path,
                format!("expected a mapping document, found {}", kind_name(&other)),
            )),
        }
    }

    /// Parse values from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    /// Parse values from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Ok(Self(value))
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Merge multiple values in order
    pub fn merge_all(values: Vec<Values>) -> Self {
        let mut result = Values::new();
        for v in values {
            result.merge(&v);
        }
        result
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value)
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get a string value by dotted path, ignoring empty strings
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The service name: `service`, falling back to `name`
    pub fn service_name(&self) -> Result<String> {
        self.get_str("service")
            .or_else(|| self.get_str("name"))
            .map(str::to_string)
            .ok_or(CoreError::MissingServiceName)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }
}

/// Cascading builder for the render context
///
/// Every `add*` call merges into internal state. [`ValueBuilder::build`]
/// hands out an owned snapshot, so later additions never leak into a context
/// that was already handed to a renderer.
#[derive(Debug, Clone, Default)]
pub struct ValueBuilder {
    locals: Values,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self {
            locals: Values::new(),
        }
    }

    /// Seed configuration defaults, OS facts, identity fields and volume paths
    pub fn add_defaults(&mut self, spec: &PackageSpec, config: &AftConfig) -> &mut Self {
        let defaults = serde_json::to_value(&config.defaults).unwrap_or(JsonValue::Null);
        if defaults.is_object() {
            self.locals.merge(&Values(defaults));
        }

        let service = spec.service_name();
        let volumes = VolumePaths::new(&config.paths.data, service);

        let seeded = json!({
            "name": spec.name,
            "service": service,
            "image": spec.image,
            "os": os_facts(),
            "volumes": volumes,
            "secrets": {},
        });
        self.locals.merge(&Values(seeded));
        self
    }

    /// Deep merge an arbitrary mapping
    pub fn add(&mut self, values: &Values) -> &mut Self {
        self.locals.merge(values);
        self
    }

    /// Read value files in order and merge each one; later files win
    pub fn add_value_files<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<&mut Self> {
        for file in files {
            let values = Values::from_file(file)?;
            tracing::debug!(file = %file.as_ref().display(), "merged value file");
            self.locals.merge(&values);
        }
        Ok(self)
    }

    /// Snapshot of the merged context
    pub fn build(&self) -> Values {
        self.locals.clone()
    }
}

/// Standard per-service host directories rooted under the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePaths {
    pub etc: String,
    pub data: String,
    pub certs: String,
    pub logs: String,
    pub tmp: String,
    pub cache: String,
}

impl VolumePaths {
    pub fn new(data_dir: &Path, service: &str) -> Self {
        let root = |parts: &[&str]| -> String {
            let mut path = data_dir.to_path_buf();
            for part in parts {
                path.push(part);
            }
            normalize(&path)
        };

        Self {
            etc: root(&["etc", service]),
            data: root(&["data", service]),
            certs: root(&["etc", "certs"]),
            logs: root(&["var", "logs", service]),
            tmp: root(&["var", "tmp", service]),
            cache: root(&["var", "cache", service]),
        }
    }
}

/// Forward-slash rendering of a path for templates
fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn os_facts() -> JsonValue {
    let os = std::env::consts::OS;
    json!({
        "family": std::env::consts::FAMILY,
        "name": os,
        "arch": std::env::consts::ARCH,
        "windows": os == "windows",
        "linux": os == "linux",
        "darwin": os == "macos",
    })
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Set a nested value by path
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) -> Result<()> {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return Ok(());
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    let JsonValue::Object(map) = value else {
        return Err(CoreError::ValuesMerge {
            message: format!("cannot set '{}' on a non-mapping value", key),
        });
    };

    if remaining.is_empty() {
        map.insert(key.to_string(), new_value);
    } else {
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        set_nested(entry, remaining, new_value)?;
    }

    Ok(())
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

/// Parse --set arguments (key=value format)
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for arg in set_args {
        let (key, val) = arg.split_once('=').ok_or_else(|| CoreError::ValuesMerge {
            message: format!("Invalid --set format: '{}'. Expected key=value", arg),
        })?;

        // Try to parse as JSON, fallback to string
        let json_value = if val == "true" {
            JsonValue::Bool(true)
        } else if val == "false" {
            JsonValue::Bool(false)
        } else if val == "null" {
            JsonValue::Null
        } else if let Ok(num) = val.parse::<i64>() {
            JsonValue::Number(num.into())
        } else if let Some(num) = val.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            JsonValue::Number(num)
        } else if val.starts_with('[') || val.starts_with('{') {
            serde_json::from_str(val).unwrap_or(JsonValue::String(val.to_string()))
        } else {
            JsonValue::String(val.to_string())
        };

        values.set(key, json_value)?;
    }

    Ok(values)
}
