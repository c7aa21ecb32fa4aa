//! Reconcile the artifact listings returned by the backend.
//!
//! Artifact endpoints answer in several shapes depending on the connector
//! and backend version. [`ArtifactResponse::detect`] classifies a raw JSON
//! value into exactly one shape, and [`ArtifactResponse::into_artifacts`]
//! reduces every shape to the same deduplicated [`Artifact`] list.

use std::collections::HashSet;

use ms_rest_api_contract::SourceKind;
use serde_json::{Map, Value};

use crate::artifact::Artifact;

/// Category keys recognised in bucketed responses, in output order
pub const ARTIFACT_CATEGORIES: &[&str] = &[
    "tables",
    "views",
    "procedures",
    "functions",
    "collections",
    "indexes",
    "triggers",
];

/// Categories fetched one by one for SQL-like sources
pub const SQL_FETCH_CATEGORIES: &[&str] = &["tables", "views", "procedures", "functions"];

/// Singular object type for a category key (`"tables"` → `"table"`)
pub fn singularize(category: &str) -> String {
    match category {
        "indexes" => "index".to_string(),
        other => other.strip_suffix('s').unwrap_or(other).to_string(),
    }
}

/// One element of a listing: a bare name or a structured record
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactEntry {
    Name(String),
    Record(Artifact),
}

impl ArtifactEntry {
    /// Decode one array element; anything that is neither a non-empty string
    /// nor an object with a name is dropped.
    fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) if !name.is_empty() => Some(ArtifactEntry::Name(name.clone())),
            Value::Object(object) => Artifact::from_object(object).map(ArtifactEntry::Record),
            _ => None,
        }
    }

    fn decode_all(items: &[Value]) -> Vec<Self> {
        items.iter().filter_map(Self::decode).collect()
    }

    fn into_artifact(self, default_type: &str) -> Artifact {
        match self {
            ArtifactEntry::Name(name) => Artifact::container(name, default_type),
            ArtifactEntry::Record(mut artifact) => {
                if artifact.object_type.is_none() {
                    artifact.object_type = Some(default_type.to_string());
                }
                artifact
            }
        }
    }
}

/// The shapes an artifact listing can take
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactResponse {
    /// `null` or absent payload
    Empty,
    /// `["orders", ...]` or `[{ "name": ... }, ...]`
    List(Vec<ArtifactEntry>),
    /// `{ "tables": [...], "views": [...], ... }`
    Buckets(Vec<(String, Vec<ArtifactEntry>)>),
    /// `{ "objects": [...] }`
    Objects(Vec<ArtifactEntry>),
    /// `{ "name": ... }`
    Single(Artifact),
    /// Anything else
    Unrecognized,
}

impl ArtifactResponse {
    /// Classify a raw payload.
    ///
    /// An object holding an `objects` array wins over category buckets,
    /// which win over a lone `name`.
    pub fn detect(data: Option<&Value>) -> Self {
        let Some(data) = data else {
            return ArtifactResponse::Empty;
        };

        match data {
            Value::Null => ArtifactResponse::Empty,
            Value::Array(items) => ArtifactResponse::List(ArtifactEntry::decode_all(items)),
            Value::Object(object) => Self::detect_object(object),
            _ => ArtifactResponse::Unrecognized,
        }
    }

    fn detect_object(object: &Map<String, Value>) -> Self {
        if let Some(Value::Array(objects)) = object.get("objects") {
            return ArtifactResponse::Objects(ArtifactEntry::decode_all(objects));
        }

        let buckets: Vec<(String, Vec<ArtifactEntry>)> = ARTIFACT_CATEGORIES
            .iter()
            .filter_map(|key| match object.get(*key) {
                Some(Value::Array(items)) => {
                    Some((key.to_string(), ArtifactEntry::decode_all(items)))
                }
                _ => None,
            })
            .collect();
        if !buckets.is_empty() {
            return ArtifactResponse::Buckets(buckets);
        }

        match Artifact::from_object(object) {
            Some(artifact) => ArtifactResponse::Single(artifact),
            None => ArtifactResponse::Unrecognized,
        }
    }

    /// Reduce to the uniform list, deduplicated by `(name, object_type)` with
    /// the first occurrence kept.
    pub fn into_artifacts(self, source_type: &str) -> Vec<Artifact> {
        let default_type = SourceKind::from_type(source_type).container_type();

        let artifacts: Vec<Artifact> = match self {
            ArtifactResponse::Empty | ArtifactResponse::Unrecognized => Vec::new(),
            ArtifactResponse::List(entries) | ArtifactResponse::Objects(entries) => entries
                .into_iter()
                .map(|entry| entry.into_artifact(default_type))
                .collect(),
            ArtifactResponse::Buckets(buckets) => buckets
                .into_iter()
                .flat_map(|(category, entries)| {
                    let object_type = singularize(&category);
                    entries
                        .into_iter()
                        .map(move |entry| entry.into_artifact(&object_type))
                })
                .collect(),
            ArtifactResponse::Single(artifact) => {
                vec![ArtifactEntry::Record(artifact).into_artifact(default_type)]
            }
        };

        dedup_artifacts(artifacts)
    }
}

/// Normalize one raw artifact payload for a source of the given type
pub fn normalize_artifacts(data: Option<&Value>, source_type: &str) -> Vec<Artifact> {
    ArtifactResponse::detect(data).into_artifacts(source_type)
}

/// Drop later duplicates of the same `(name, object_type)`, keeping order
pub fn dedup_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Vec<Artifact> {
    let mut seen = HashSet::new();
    artifacts
        .into_iter()
        .filter(|artifact| seen.insert(artifact.dedup_key()))
        .collect()
}

/// Normalize several per-category payloads of the same source and merge them
pub fn merge_listings<'a>(
    payloads: impl IntoIterator<Item = &'a Value>,
    source_type: &str,
) -> Vec<Artifact> {
    dedup_artifacts(
        payloads
            .into_iter()
            .flat_map(|payload| normalize_artifacts(Some(payload), source_type)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(artifacts: &[Artifact]) -> Vec<(&str, &str)> {
        artifacts
            .iter()
            .map(|a| (a.name.as_str(), a.object_type.as_deref().unwrap_or("")))
            .collect()
    }

    #[test]
    fn test_string_array_defaults_by_source() {
        let data = json!(["orders", "customers"]);
        let sql = normalize_artifacts(Some(&data), "postgres");
        assert_eq!(names(&sql), vec![("orders", "table"), ("customers", "table")]);
        assert_eq!(sql[0].table, "orders");

        let mongo = normalize_artifacts(Some(&data), "mongodb");
        assert_eq!(names(&mongo), vec![("orders", "collection"), ("customers", "collection")]);
    }

    #[test]
    fn test_object_array_keeps_declared_type() {
        let data = json!([
            {"name": "orders", "object_type": "view"},
            {"name": "customers"}
        ]);
        let artifacts = normalize_artifacts(Some(&data), "mysql");
        assert_eq!(names(&artifacts), vec![("orders", "view"), ("customers", "table")]);
    }

    #[test]
    fn test_buckets_singularize_category() {
        let data = json!({
            "tables": ["orders"],
            "views": [{"name": "active_orders"}],
            "indexes": ["orders_pk"],
            "procedures": []
        });
        let artifacts = normalize_artifacts(Some(&data), "postgres");
        assert_eq!(
            names(&artifacts),
            vec![("orders", "table"), ("active_orders", "view"), ("orders_pk", "index")]
        );
    }

    #[test]
    fn test_collections_bucket() {
        let data = json!({"collections": ["events", {"name": "users", "object_type": "timeseries"}]});
        let artifacts = normalize_artifacts(Some(&data), "mongodb");
        assert_eq!(names(&artifacts), vec![("events", "collection"), ("users", "timeseries")]);
    }

    #[test]
    fn test_objects_shape_wins_over_buckets() {
        let data = json!({
            "tables": ["ignored"],
            "objects": [{"name": "events", "fields": []}]
        });
        assert!(matches!(
            ArtifactResponse::detect(Some(&data)),
            ArtifactResponse::Objects(_)
        ));
        let artifacts = normalize_artifacts(Some(&data), "mongo");
        assert_eq!(names(&artifacts), vec![("events", "collection")]);
    }

    #[test]
    fn test_single_object() {
        let data = json!({"name": "orders", "row_count": 10});
        let artifacts = normalize_artifacts(Some(&data), "oracle");
        assert_eq!(names(&artifacts), vec![("orders", "table")]);
        assert_eq!(artifacts[0].row_count, Some(10));
    }

    #[test]
    fn test_empty_and_unrecognized_inputs() {
        assert!(normalize_artifacts(None, "postgres").is_empty());
        assert!(normalize_artifacts(Some(&Value::Null), "postgres").is_empty());
        assert!(normalize_artifacts(Some(&json!(42)), "postgres").is_empty());
        assert!(normalize_artifacts(Some(&json!({"status": "ok"})), "postgres").is_empty());
        assert_eq!(
            ArtifactResponse::detect(Some(&json!("tables"))),
            ArtifactResponse::Unrecognized
        );
    }

    #[test]
    fn test_dedup_by_name_and_type() {
        let data = json!({
            "tables": ["orders", "orders", {"name": "orders", "description": "dup"}],
            "views": ["orders"]
        });
        let artifacts = normalize_artifacts(Some(&data), "postgres");
        assert_eq!(names(&artifacts), vec![("orders", "table"), ("orders", "view")]);
        assert_eq!(artifacts[0].description, None);
    }

    #[test]
    fn test_skips_unnamed_entries() {
        let data = json!(["", null, 3, {"table": "x"}, "orders"]);
        let artifacts = normalize_artifacts(Some(&data), "postgres");
        assert_eq!(names(&artifacts), vec![("orders", "table")]);
    }

    #[test]
    fn test_merge_listings_across_categories() {
        let tables = json!({"tables": ["orders", "users"]});
        let views = json!({"views": ["orders"]});
        let again = json!({"tables": ["users"]});
        let merged = merge_listings([&tables, &views, &again], "postgres");
        assert_eq!(
            names(&merged),
            vec![("orders", "table"), ("users", "table"), ("orders", "view")]
        );
    }

    #[test]
    fn test_every_shape_yields_named_typed_unique_artifacts() {
        let shapes = [
            json!(["a", "b", "a"]),
            json!([{"name": "a"}, {"name": "a", "object_type": "view"}, {"name": "a"}]),
            json!({"tables": ["a"], "views": ["a"], "collections": [{"name": "c"}]}),
            json!({"objects": [{"name": "a"}, {"name": "a"}, {"name": "b", "object_type": "view"}]}),
            json!({"name": "single"}),
        ];

        for shape in &shapes {
            for source in ["postgres", "mongodb"] {
                let artifacts = normalize_artifacts(Some(shape), source);
                assert!(!artifacts.is_empty(), "shape {} produced nothing", shape);
                let mut keys = HashSet::new();
                for artifact in &artifacts {
                    assert!(!artifact.name.is_empty());
                    assert!(artifact.object_type.is_some());
                    assert!(keys.insert(artifact.dedup_key()), "duplicate in {}", shape);
                }
            }
        }
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("tables"), "table");
        assert_eq!(singularize("indexes"), "index");
        assert_eq!(singularize("collections"), "collection");
    }
}
