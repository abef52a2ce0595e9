//! Host context handed to service registration callbacks

use serde_json::Value;
use silo_config::binding;

/// Environment name plus a snapshot of the app configuration
#[derive(Debug, Clone)]
pub struct HostContext {
    pub environment_name: String,
    pub configuration: Value,
}

impl HostContext {
    pub fn new(environment_name: impl Into<String>, configuration: Value) -> Self {
        Self {
            environment_name: environment_name.into(),
            configuration,
        }
    }

    pub fn is_environment(&self, name: &str) -> bool {
        self.environment_name.eq_ignore_ascii_case(name)
    }

    pub fn is_development(&self) -> bool {
        self.is_environment("Development")
    }

    /// Case-insensitive lookup of a `:`-separated key (`Orleans:SiloConfig:ClusterId`)
    pub fn setting(&self, key: &str) -> Option<&Value> {
        let path: Vec<&str> = key.split(':').filter(|segment| !segment.is_empty()).collect();
        binding::lookup(&self.configuration, &path)
    }

    /// Scalar setting rendered as a string
    pub fn setting_str(&self, key: &str) -> Option<String> {
        match self.setting(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }
}
