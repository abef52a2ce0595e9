//! Case-insensitive section binding
//!
//! Layered configuration arrives as a lower-cased JSON tree (environment
//! keys are lower-cased by the env source, file and command-line keys by
//! the loader). Typed options use PascalCase names. Binding conforms the
//! raw tree to the shape of `T::default()` before handing it to serde:
//! keys are matched ignoring case and `_`, string scalars are coerced to
//! the target scalar type, and index-keyed objects become arrays.

use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Canonical form used for key comparison
pub fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find a child of an object by case-insensitive key
pub fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let wanted = canonical_key(key);
    value
        .as_object()?
        .iter()
        .find(|(candidate, _)| canonical_key(candidate) == wanted)
        .map(|(_, child)| child)
}

/// Walk a section path (`["Orleans", "SiloConfig"]`) case-insensitively
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| child(node, segment))
}

/// Recursively lower-case object keys
pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key.to_lowercase(), lowercase_keys(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Bind a raw section to typed options; a missing section yields defaults
pub fn bind<T>(section: Option<&Value>, section_name: &str) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let Some(raw) = section else {
        return Ok(T::default());
    };

    // Present-but-empty sections (`"SiloConfig": ""`) bind like missing ones
    if raw.is_null() || raw.as_str().is_some_and(str::is_empty) {
        return Ok(T::default());
    }

    let template = serde_json::to_value(T::default()).map_err(|source| ConfigError::Binding {
        section: section_name.to_string(),
        source,
    })?;

    serde_json::from_value(conform(raw.clone(), &template)).map_err(|source| {
        ConfigError::Binding {
            section: section_name.to_string(),
            source,
        }
    })
}

fn conform(input: Value, template: &Value) -> Value {
    match (input, template) {
        (Value::Object(map), Value::Object(shape)) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let wanted = canonical_key(&key);
                match shape.iter().find(|(name, _)| canonical_key(name) == wanted) {
                    Some((name, child_shape)) => {
                        out.insert(name.clone(), conform(value, child_shape));
                    }
                    // Free-form maps (and unknown fields) keep their keys
                    None => {
                        out.insert(key, conform(value, &Value::Null));
                    }
                }
            }
            Value::Object(out)
        }
        (Value::Object(map), Value::Array(shape)) => {
            let element_shape = shape.first().unwrap_or(&Value::Null);
            match indexed_to_array(map) {
                Ok(items) => Value::Array(
                    items.into_iter().map(|item| conform(item, element_shape)).collect(),
                ),
                Err(map) => Value::Object(map),
            }
        }
        (Value::Array(items), Value::Array(shape)) => {
            let element_shape = shape.first().unwrap_or(&Value::Null);
            Value::Array(items.into_iter().map(|item| conform(item, element_shape)).collect())
        }
        (Value::Object(map), Value::Null) => match indexed_to_array(map) {
            Ok(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| conform(item, &Value::Null))
                    .collect(),
            ),
            Err(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, conform(value, &Value::Null)))
                    .collect(),
            ),
        },
        (Value::String(text), Value::Bool(_)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        (Value::String(text), Value::Number(_)) => {
            parse_number(text.trim()).unwrap_or(Value::String(text))
        }
        (Value::Number(number), Value::String(_)) => Value::String(number.to_string()),
        (Value::Bool(flag), Value::String(_)) => Value::String(flag.to_string()),
        (input, _) => input,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(unsigned) = text.parse::<u64>() {
        return Some(Value::from(unsigned));
    }
    if let Ok(signed) = text.parse::<i64>() {
        return Some(Value::from(signed));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// `{"0": a, "1": b}` becomes `[a, b]`; anything else is handed back
fn indexed_to_array(
    map: Map<String, Value>,
) -> std::result::Result<Vec<Value>, Map<String, Value>> {
    if map.is_empty() || !map.keys().all(|key| key.parse::<usize>().is_ok()) {
        return Err(map);
    }

    let mut indexed: Vec<(usize, Value)> = map
        .into_iter()
        .filter_map(|(key, value)| key.parse::<usize>().ok().map(|index| (index, value)))
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, value)| value).collect())
}

/// Accepts `true`, `"true"`, `"True"`, ... for optional flags
pub(crate) fn lenient_optional_bool<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(flag)) => Ok(Some(flag)),
        Some(Flag::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("invalid boolean value: {other}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{GrainLoadOption, MultiClusterOption, ProviderConfig, SiloConfig};
    use serde_json::json;

    #[test]
    fn test_keys_match_ignoring_case() {
        let raw = json!({
            "clusterid": "c1",
            "SERVICEID": "s1",
            "silo_port": "2000",
            "listenonanyhostaddress": "True",
            "responsetimeoutminutes": "1.5"
        });

        let silo: SiloConfig = bind(Some(&raw), "SiloConfig").unwrap();
        assert_eq!(silo.cluster_id, "c1");
        assert_eq!(silo.service_id, "s1");
        assert_eq!(silo.silo_port, 2000);
        assert!(silo.listen_on_any_host_address);
        assert_eq!(silo.response_timeout_minutes, 1.5);
        // untouched fields keep defaults
        assert_eq!(silo.gateway_port, 30000);
    }

    #[test]
    fn test_indexed_keys_become_arrays() {
        let raw = json!({
            "loadpaths": { "1": "b.so", "0": "a.so", "10": "k.so" },
            "excludedtypefullnames": ["X.Y"]
        });

        let option: GrainLoadOption = bind(Some(&raw), "GrainOption").unwrap();
        assert_eq!(option.load_paths, vec!["a.so", "b.so", "k.so"]);
        assert_eq!(option.excluded_type_full_names, vec!["X.Y"]);
    }

    #[test]
    fn test_free_form_maps_keep_keys() {
        let raw = json!({
            "ismulticluster": "true",
            "gossipchannels": { "Primary": "conn-a" },
            "defaultmulticluster": { "0": "c1", "1": "c2" }
        });

        let option: MultiClusterOption = bind(Some(&raw), "MultiCluster").unwrap();
        assert_eq!(option.is_multi_cluster, Some(true));
        assert_eq!(
            option.gossip_channels.unwrap().get("Primary").map(String::as_str),
            Some("conn-a")
        );
        assert_eq!(option.default_multi_cluster, Some(vec!["c1".to_string(), "c2".to_string()]));
    }

    #[test]
    fn test_nested_provider_sections() {
        let raw = json!({
            "defaultprovider": "MongoDB",
            "mongodb": {
                "cluster": { "dbconn": "mongodb://c", "dbname": "silo" },
                "storage": { "DbConn": "mongodb://s", "DbName": "grains", "CollectionPrefix": "g_" }
            }
        });

        let provider: ProviderConfig = bind(Some(&raw), "Provider").unwrap();
        assert_eq!(provider.mongo_db.cluster.db_conn, "mongodb://c");
        assert_eq!(provider.mongo_db.storage.collection_prefix.as_deref(), Some("g_"));
        assert_eq!(provider.mongo_db.reminder.db_conn, "");
    }

    #[test]
    fn test_missing_section_yields_defaults() {
        let silo: SiloConfig = bind(None, "SiloConfig").unwrap();
        assert_eq!(silo, SiloConfig::default());

        let empty = json!("");
        let silo: SiloConfig = bind(Some(&empty), "SiloConfig").unwrap();
        assert_eq!(silo, SiloConfig::default());
    }

    #[test]
    fn test_bad_port_is_a_binding_error() {
        let raw = json!({ "siloport": 70000 });
        let err = bind::<SiloConfig>(Some(&raw), "SiloConfig").unwrap_err();
        assert!(matches!(err, ConfigError::Binding { ref section, .. } if section == "SiloConfig"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let root = json!({ "orleans": { "siloconfig": { "clusterid": "c1" } } });
        let section = lookup(&root, &["Orleans", "SiloConfig"]).unwrap();
        assert_eq!(child(section, "ClusterId"), Some(&json!("c1")));
        assert!(lookup(&root, &["Orleans", "Provider"]).is_none());
    }
}
