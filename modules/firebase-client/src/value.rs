// Firestore's typed value encoding for the REST API.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub type Fields = BTreeMap<String, Value>;

/// A single Firestore field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(Fields),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

#[derive(Serialize)]
struct MapValue<'a> {
    fields: &'a Fields,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Value::Null => map.serialize_entry("nullValue", &())?,
            Value::Boolean(b) => map.serialize_entry("booleanValue", b)?,
            // int64 travels as a decimal string in the REST encoding.
            Value::Integer(i) => map.serialize_entry("integerValue", &i.to_string())?,
            Value::Double(d) => map.serialize_entry("doubleValue", d)?,
            Value::String(s) => map.serialize_entry("stringValue", s)?,
            Value::Timestamp(t) => map.serialize_entry(
                "timestampValue",
                &t.to_rfc3339_opts(SecondsFormat::Millis, true),
            )?,
            Value::Map(fields) => map.serialize_entry("mapValue", &MapValue { fields })?,
        }
        map.end()
    }
}

/// Leaf field paths for an update mask. Nested maps contribute dotted paths so a
/// merge only touches the keys actually being written.
pub fn field_paths(fields: &Fields) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(fields, None, &mut paths);
    paths
}

fn collect_paths(fields: &Fields, prefix: Option<&str>, out: &mut Vec<String>) {
    for (key, value) in fields {
        let segment = quote_segment(key);
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{segment}"),
            None => segment,
        };
        match value {
            Value::Map(inner) if !inner.is_empty() => collect_paths(inner, Some(&path), out),
            _ => out.push(path),
        }
    }
}

/// Segments that are not simple identifiers must be backtick-quoted.
fn quote_segment(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// A document as returned by `GET .../documents/{path}`. Field values are kept
/// in their raw REST encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn scalar_values_use_rest_encoding() {
        assert_eq!(
            serde_json::to_value(Value::from("hola")).unwrap(),
            json!({"stringValue": "hola"})
        );
        assert_eq!(
            serde_json::to_value(Value::from(1357387200000_i64)).unwrap(),
            json!({"integerValue": "1357387200000"})
        );
        assert_eq!(
            serde_json::to_value(Value::Boolean(true)).unwrap(),
            json!({"booleanValue": true})
        );
        assert_eq!(
            serde_json::to_value(Value::Null).unwrap(),
            json!({"nullValue": null})
        );
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let t = Utc.with_ymd_and_hms(2013, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(
            serde_json::to_value(Value::from(t)).unwrap(),
            json!({"timestampValue": "2013-01-05T12:00:00.000Z"})
        );
    }

    #[test]
    fn nested_maps_encode_fields() {
        let mut inner = Fields::new();
        inner.insert("source".into(), Value::from("astro"));
        let value = Value::Map(inner);
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            json!({"mapValue": {"fields": {"source": {"stringValue": "astro"}}}})
        );
    }

    #[test]
    fn field_paths_descend_into_maps() {
        let mut legacy = Fields::new();
        legacy.insert("sourceFile".into(), Value::from("a"));
        legacy.insert("migratedAtMs".into(), Value::from(1_i64));

        let mut fields = Fields::new();
        fields.insert("title".into(), Value::from("t"));
        fields.insert("legacy".into(), Value::Map(legacy));
        fields.insert("empty".into(), Value::Map(Fields::new()));

        assert_eq!(
            field_paths(&fields),
            vec![
                "empty",
                "legacy.migratedAtMs",
                "legacy.sourceFile",
                "title"
            ]
        );
    }

    #[test]
    fn odd_segments_are_quoted() {
        let mut fields = Fields::new();
        fields.insert("post-id".into(), Value::from("x"));
        fields.insert("9lives".into(), Value::from("y"));
        assert_eq!(field_paths(&fields), vec!["`9lives`", "`post-id`"]);
    }

    #[test]
    fn document_without_fields_parses() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/posts/abc",
            "createTime": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(doc.fields.is_empty());
        assert_eq!(doc.update_time, None);
    }
}
