//! Layered configuration: TOML file, overridden by environment variables.

use std::path::Path;

use crate::error::{Error, Result};

/// Load a TOML config file and apply `PREFIX__SECTION__KEY`-style env
/// overrides by re-serializing into a generic `toml::Value` tree before
/// final deserialization into `T`.
pub fn load<T: serde::de::DeserializeOwned>(path: &Path, env_prefix: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::InvariantViolation(format!("reading config {}: {e}", path.display()))
    })?;
    let mut value: toml::Value = toml::from_str(&text).map_err(|e| {
        Error::InvariantViolation(format!("parsing config {}: {e}", path.display()))
    })?;

    apply_env_overrides(&mut value, env_prefix);

    value
        .try_into()
        .map_err(|e| Error::InvariantViolation(format!("invalid config: {e}")))
}

fn apply_env_overrides(root: &mut toml::Value, prefix: &str) {
    let marker = format!("{prefix}__");
    for (key, raw) in std::env::vars() {
        let Some(path) = key.strip_prefix(&marker) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(|s| s.to_ascii_lowercase()).collect();
        set_path(root, &segments, &raw);
    }
}

fn set_path(root: &mut toml::Value, segments: &[String], raw: &str) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let table = root
        .as_table_mut()
        .unwrap_or_else(|| panic!("config root must be a table"));
    if rest.is_empty() {
        let parsed = parse_scalar(raw);
        table.insert(head.clone(), parsed);
        return;
    }
    let entry = table
        .entry(head.clone())
        .or_insert_with(|| toml::Value::Table(Default::default()));
    set_path(entry, rest, raw);
}

fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(raw.to_string())
}
