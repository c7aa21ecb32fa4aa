//! The uniform artifact record every backend shape is reduced to

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One schema-level object: a table, view, collection, or a column/field
/// within one.
///
/// `name` is never empty. For containers `table` equals `name`; for fields
/// it names the parent container (empty when the backend did not say).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Artifact {
    /// A container known only by its name
    pub fn container(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            object_type: Some(object_type.into()),
            ..Default::default()
        }
    }

    /// A field of `table` known only by its name
    pub fn field(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// Read an artifact out of a loosely-typed backend object.
    ///
    /// Returns `None` when the object has no non-empty string `name`. Unknown
    /// keys are ignored and mistyped optional keys are treated as absent.
    /// `table` falls back to `name`.
    pub fn from_object(object: &Map<String, Value>) -> Option<Self> {
        let name = non_empty_str(object.get("name"))?;
        let table = non_empty_str(object.get("table")).unwrap_or_else(|| name.clone());

        Some(Self {
            table,
            object_type: non_empty_str(object.get("object_type")),
            types: read_types(object),
            nullable: object.get("nullable").and_then(Value::as_bool),
            primary_key: object.get("primary_key").and_then(Value::as_bool),
            row_count: object.get("row_count").and_then(read_count),
            description: non_empty_str(object.get("description")),
            name,
        })
    }

    /// Key used to drop duplicates: name plus object type
    pub fn dedup_key(&self) -> (String, String) {
        (self.name.clone(), self.object_type.clone().unwrap_or_default())
    }

    /// Whether this record stands for its own container
    pub fn is_container(&self) -> bool {
        self.table == self.name
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// `types` is normally a list, but single strings show up under `types` or
// `type` depending on the connector.
fn read_types(object: &Map<String, Value>) -> Option<Vec<String>> {
    match object.get("types").or_else(|| object.get("type"))? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        Value::String(s) if !s.is_empty() => Some(vec![s.clone()]),
        _ => None,
    }
}

fn read_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_object_reads_known_fields() {
        let artifact = Artifact::from_object(&object(json!({
            "name": "email",
            "table": "users",
            "types": ["varchar", "text"],
            "nullable": true,
            "primary_key": false,
            "row_count": 120,
            "description": "contact address",
            "pii": true
        })))
        .unwrap();

        assert_eq!(artifact.name, "email");
        assert_eq!(artifact.table, "users");
        assert_eq!(artifact.types, Some(vec!["varchar".to_string(), "text".to_string()]));
        assert_eq!(artifact.nullable, Some(true));
        assert_eq!(artifact.primary_key, Some(false));
        assert_eq!(artifact.row_count, Some(120));
        assert!(!artifact.is_container());
    }

    #[test]
    fn test_from_object_requires_name() {
        assert!(Artifact::from_object(&object(json!({"table": "users"}))).is_none());
        assert!(Artifact::from_object(&object(json!({"name": ""}))).is_none());
        assert!(Artifact::from_object(&object(json!({"name": 5}))).is_none());
    }

    #[test]
    fn test_from_object_defaults_table_and_single_type() {
        let artifact = Artifact::from_object(&object(json!({"name": "orders", "type": "BASE TABLE"}))).unwrap();
        assert_eq!(artifact.table, "orders");
        assert!(artifact.is_container());
        assert_eq!(artifact.types, Some(vec!["BASE TABLE".to_string()]));
    }
}
