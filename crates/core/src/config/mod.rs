use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EffectsError, Result};

/// Top-level configuration: manager settings plus one definition set per
/// effect type, keyed by the type's set name (`"screens"`, `"shakes"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub settings: ManagerConfig,
    pub effects: Map<String, Value>,
}

impl EffectsConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: Self = contents.parse()?;
        tracing::debug!(path = %path.display(), sets = config.effects.len(), "loaded effects config");
        Ok(config)
    }

    /// Names of the definitions in the set `set_name`.
    pub fn definition_names(&self, set_name: &str) -> Vec<&str> {
        match self.effects.get(set_name) {
            Some(Value::Object(definitions)) => definitions.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl FromStr for EffectsConfig {
    type Err = EffectsError;

    fn from_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;

        if let Some((name, _)) = config
            .effects
            .iter()
            .find(|(_, definitions)| !definitions.is_object())
        {
            return Err(EffectsError::invalid_definition(
                name.as_str(),
                "definition sets must be JSON objects",
            ));
        }

        Ok(config)
    }
}

/// Settings applied to the [`EffectsManager`](crate::manager::EffectsManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub enabled: bool,
    /// Maximum number of live instances; unlimited when absent.
    pub slot_capacity: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slot_capacity: None,
        }
    }
}
