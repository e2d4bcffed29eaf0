use anyhow::Context;
use include_dir::{include_dir, Dir};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;

use super::paths;
use super::settings::UserSettings;
use crate::domain::model::ApprovalConfig;

// Embed the entire configs directory at compile time
static CONFIGS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources/configs");

/// Load a YAML file from disk
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Parse YAML from string
pub fn parse_yaml<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let config: T = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Embedded YAML document by name, or `Null` if missing or invalid
pub fn embedded_value(name: &str) -> Value {
    let file_name = format!("{}.yaml", name);

    let Some(file) = CONFIGS_DIR.get_file(&file_name) else {
        tracing::warn!("Embedded config {} not found, using defaults", name);
        return Value::Null;
    };
    let Some(content) = file.contents_utf8() else {
        tracing::error!("Embedded config {} is not valid UTF-8", name);
        return Value::Null;
    };
    match parse_yaml::<Value>(content) {
        Ok(value) => {
            tracing::debug!("Loaded embedded config: {}", name);
            value
        }
        Err(e) => {
            tracing::error!("Failed to parse embedded config {}: {}", name, e);
            Value::Null
        }
    }
}

/// Load user settings from settings.yaml in user config directory.
/// Returns default settings if file doesn't exist or is invalid.
pub fn load_user_settings() -> UserSettings {
    let settings_path = paths::settings_file();

    if settings_path.exists() {
        match load_yaml::<UserSettings>(&settings_path) {
            Ok(settings) => {
                tracing::info!("Loaded user settings from {:?}", settings_path);
                return settings;
            }
            Err(e) => {
                tracing::warn!("Failed to parse settings.yaml: {}, using defaults", e);
            }
        }
    } else {
        tracing::debug!("No settings.yaml found, using defaults");
    }

    UserSettings::default()
}

/// Build the session configuration from embedded defaults, the user
/// settings' `approval` section and an optional explicit file, in that order.
pub fn load_approval_config(
    settings: &UserSettings,
    explicit: Option<&Path>,
) -> anyhow::Result<ApprovalConfig> {
    let mut merged = embedded_value("approval");
    merge_yaml(&mut merged, settings.approval.clone());

    if let Some(path) = explicit {
        let overlay: Value = load_yaml(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        merge_yaml(&mut merged, overlay);
        tracing::info!("Loaded config file {:?}", path);
    }

    let config = config_from_value(merged)?;
    config.validate()?;
    Ok(config)
}

fn config_from_value(value: Value) -> anyhow::Result<ApprovalConfig> {
    if value.is_null() {
        return Ok(ApprovalConfig::default());
    }
    let config = serde_yaml::from_value(value).context("Invalid approval configuration")?;
    Ok(config)
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; anything
/// else in the overlay replaces the base value. A null overlay changes nothing.
pub fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
