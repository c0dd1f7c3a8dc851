use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::errors::CommandError;

/// Runtime parameters of one instance's protocol client.
///
/// Kept as a flat JSON object so that client-specific keys survive a
/// round trip. Only keys that already exist may be changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeParams(pub Map<String, Value>);

impl Default for RuntimeParams {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("platform".into(), Value::from(5));
        map.insert("log_level".into(), Value::from("info"));
        map.insert("ignore_self".into(), Value::from(true));
        map.insert("resend".into(), Value::from(true));
        map.insert("reconn_interval".into(), Value::from(5));
        map.insert("cache_group_member".into(), Value::from(true));
        Self(map)
    }
}

impl RuntimeParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Overwrite an existing key, coercing `raw` to the current value's type
    pub fn set(&mut self, key: &str, raw: &str) -> Result<&Value, CommandError> {
        let current = self
            .0
            .get_mut(key)
            .ok_or_else(|| CommandError::InvalidArgs(format!("unknown key: {}", key)))?;

        let value = match current {
            Value::Bool(_) => Value::Bool(raw != "false"),
            Value::Number(_) => match raw.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => match raw.parse::<f64>() {
                    Ok(f) if f.is_finite() => Value::from(f),
                    _ => current.clone(),
                },
            },
            _ if raw == "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        };

        *current = value;
        Ok(current)
    }

    pub fn to_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}
