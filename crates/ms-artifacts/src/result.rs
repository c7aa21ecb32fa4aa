//! Flatten scan job results into artifact rows.
//!
//! Results differ from artifact listings in that containers may carry their
//! fields, so a document is reduced to one row per field (tagged with its
//! container) plus one row for every container that has no fields.

use ms_rest_api_contract::{ScanJobResult, SourceKind};
use serde_json::{Map, Value};
use tracing::warn;

use crate::artifact::Artifact;

/// Object type given to fields that do not declare one
pub const FIELD_TYPE: &str = "column";

/// A container as it appears in `{ "objects": [...] }`
#[derive(Debug, Clone, PartialEq)]
pub struct ResultObject {
    pub container: Artifact,
    pub fields: Option<Vec<Artifact>>,
}

/// The shapes a result document can take
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    Empty,
    /// `[{ "name": ... }, ...]`: columns with no known container
    Columns(Vec<Artifact>),
    /// `["orders", ...]`: containers only
    Names(Vec<String>),
    /// `{ "objects": [{ "name", "fields": [...] }] }`
    Objects(Vec<ResultObject>),
    /// `{ "orders": [col, ...], "users": ["id", ...] }`
    Keyed(Vec<(String, Vec<Artifact>)>),
}

impl ResultShape {
    /// Classify a parsed result document
    pub fn detect(document: &Value) -> Self {
        match document {
            Value::Array(items) => match items.first() {
                Some(Value::Object(_)) => ResultShape::Columns(
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .filter_map(Artifact::from_object)
                        .map(|mut column| {
                            column.table.clear();
                            column
                        })
                        .collect(),
                ),
                Some(Value::String(_)) => ResultShape::Names(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                ),
                _ => ResultShape::Empty,
            },
            Value::Object(object) => Self::detect_object(object),
            _ => ResultShape::Empty,
        }
    }

    fn detect_object(object: &Map<String, Value>) -> Self {
        if let Some(Value::Array(objects)) = object.get("objects") {
            return ResultShape::Objects(
                objects
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|obj| {
                        let container = Artifact::from_object(obj)?;
                        let fields = match obj.get("fields") {
                            Some(Value::Array(fields)) => {
                                Some(read_fields(&container.name, fields))
                            }
                            _ => None,
                        };
                        Some(ResultObject { container, fields })
                    })
                    .collect(),
            );
        }

        let keyed: Vec<(String, Vec<Artifact>)> = object
            .iter()
            .filter_map(|(key, value)| match value {
                Value::Array(entries) => Some((key.clone(), read_fields(key, entries))),
                _ => None,
            })
            .collect();

        if keyed.is_empty() {
            ResultShape::Empty
        } else {
            ResultShape::Keyed(keyed)
        }
    }

    /// Flatten into rows. `container_type` is used for rows that stand for a
    /// container and declare no type of their own.
    pub fn flatten(self, container_type: &str) -> Vec<Artifact> {
        match self {
            ResultShape::Empty => Vec::new(),
            ResultShape::Columns(columns) => columns.into_iter().map(typed_field).collect(),
            ResultShape::Names(names) => names
                .into_iter()
                .map(|name| Artifact::container(name, container_type))
                .collect(),
            ResultShape::Objects(objects) => objects
                .into_iter()
                .flat_map(|object| match object.fields {
                    Some(fields) if !fields.is_empty() => {
                        fields.into_iter().map(typed_field).collect::<Vec<_>>()
                    }
                    _ => {
                        let mut container = object.container;
                        container.table = container.name.clone();
                        container
                            .object_type
                            .get_or_insert_with(|| container_type.to_string());
                        vec![container]
                    }
                })
                .collect(),
            ResultShape::Keyed(groups) => groups
                .into_iter()
                .flat_map(|(_, fields)| fields.into_iter().map(typed_field))
                .collect(),
        }
    }
}

fn read_fields(container: &str, entries: &[Value]) -> Vec<Artifact> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) if !name.is_empty() => Some(Artifact::field(container, name.clone())),
            Value::Object(object) => Artifact::from_object(object).map(|mut field| {
                field.table = container.to_string();
                field
            }),
            _ => None,
        })
        .collect()
}

fn typed_field(mut field: Artifact) -> Artifact {
    if field.object_type.is_none() {
        field.object_type = Some(FIELD_TYPE.to_string());
    }
    field
}

/// Decode `metadata_json`, which may be inline JSON or a JSON-encoded string.
///
/// A string that fails to parse is logged and treated as no data.
pub fn parse_metadata(metadata: Option<&Value>) -> Option<Value> {
    match metadata? {
        Value::Null => None,
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "discarding unparseable scan metadata");
                None
            }
        },
        other => Some(other.clone()),
    }
}

/// Flatten the metadata of a scan job result into artifact rows
pub fn flatten_scan_result(result: &ScanJobResult) -> Vec<Artifact> {
    let Some(document) = parse_metadata(result.metadata_json.as_ref()) else {
        return Vec::new();
    };

    let kind = document
        .get("source_type")
        .and_then(Value::as_str)
        .map(SourceKind::from_type)
        .unwrap_or(SourceKind::Sql);

    ResultShape::detect(&document).flatten(kind.container_type())
}

/// Label shown above a result table, guessed from the raw metadata text
pub fn artifact_type_label(result: &ScanJobResult) -> &'static str {
    match result.metadata_json.as_ref() {
        Some(Value::String(raw)) => ["collections", "tables", "views"]
            .into_iter()
            .find(|label| raw.contains(label))
            .unwrap_or("Result"),
        _ => "Result",
    }
}

/// Regroup flattened rows by container, keeping first-seen container order
pub fn group_by_table(artifacts: &[Artifact]) -> Vec<(String, Vec<Artifact>)> {
    let mut groups: Vec<(String, Vec<Artifact>)> = Vec::new();
    for artifact in artifacts {
        match groups.iter_mut().find(|(table, _)| *table == artifact.table) {
            Some((_, members)) => members.push(artifact.clone()),
            None => groups.push((artifact.table.clone(), vec![artifact.clone()])),
        }
    }
    groups
}
