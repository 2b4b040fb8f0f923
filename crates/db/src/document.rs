use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const ID_FIELD: &str = "_id";
pub(crate) const CREATED_AT_FIELD: &str = "createdAt";
pub(crate) const UPDATED_AT_FIELD: &str = "updatedAt";

/// A stored document: store-managed identity and timestamps plus the
/// schema-conformed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub(crate) fn new(fields: Map<String, Value>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Look up a field by name, including the store-managed ones.
    pub fn get(&self, field: &str) -> FieldRef<'_> {
        match field {
            ID_FIELD | "id" => FieldRef::Id(self.id),
            CREATED_AT_FIELD => FieldRef::Time(self.created_at),
            UPDATED_AT_FIELD => FieldRef::Time(self.updated_at),
            _ => match self.fields.get(field) {
                Some(value) => FieldRef::Value(value),
                None => FieldRef::Missing,
            },
        }
    }

    /// Remove keys the store owns from a caller-supplied body.
    pub(crate) fn strip_reserved(fields: &mut Map<String, Value>) {
        for key in [ID_FIELD, "id", CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            fields.remove(key);
        }
    }
}

/// Borrowed view of a document field used for matching and ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Missing,
    Value(&'a Value),
    Id(Uuid),
    Time(OffsetDateTime),
}

impl FieldRef<'_> {
    /// Owned JSON form; timestamps render as RFC 3339.
    pub fn to_value(&self) -> Value {
        match self {
            FieldRef::Missing => Value::Null,
            FieldRef::Value(value) => (*value).clone(),
            FieldRef::Id(id) => Value::String(id.to_string()),
            FieldRef::Time(at) => at
                .format(&time::format_description::well_known::Rfc3339)
                .map(Value::String)
                .unwrap_or(Value::Null),
        }
    }

    // null < numbers < strings < containers < ids < booleans < timestamps
    fn rank(&self) -> u8 {
        match self {
            FieldRef::Missing | FieldRef::Value(Value::Null) => 0,
            FieldRef::Value(Value::Number(_)) => 1,
            FieldRef::Value(Value::String(_)) => 2,
            FieldRef::Value(Value::Array(_)) | FieldRef::Value(Value::Object(_)) => 3,
            FieldRef::Id(_) => 4,
            FieldRef::Value(Value::Bool(_)) => 5,
            FieldRef::Time(_) => 6,
        }
    }
}

/// Total order over field values of mixed types.
pub fn compare_fields(a: &FieldRef<'_>, b: &FieldRef<'_>) -> Ordering {
    match (a, b) {
        (FieldRef::Value(Value::Number(x)), FieldRef::Value(Value::Number(y))) => {
            compare_numbers(x, y)
        }
        (FieldRef::Value(Value::String(x)), FieldRef::Value(Value::String(y))) => x.cmp(y),
        (FieldRef::Value(Value::Bool(x)), FieldRef::Value(Value::Bool(y))) => x.cmp(y),
        (FieldRef::Id(x), FieldRef::Id(y)) => x.cmp(y),
        (FieldRef::Time(x), FieldRef::Time(y)) => x.cmp(y),
        (
            FieldRef::Value(x @ (Value::Array(_) | Value::Object(_))),
            FieldRef::Value(y @ (Value::Array(_) | Value::Object(_))),
        ) => x.to_string().cmp(&y.to_string()),
        _ => a.rank().cmp(&b.rank()),
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    match (x.as_i64(), y.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

/// Equality used by filters; numbers compare by value regardless of representation.
pub(crate) fn values_equal(field: &FieldRef<'_>, expected: &Value) -> bool {
    match (field, expected) {
        (FieldRef::Value(Value::Number(x)), Value::Number(y)) => {
            compare_numbers(x, y) == Ordering::Equal
        }
        (FieldRef::Value(actual), expected) => *actual == expected,
        (FieldRef::Id(id), Value::String(expected)) => {
            Uuid::parse_str(expected).map_or(false, |expected| *id == expected)
        }
        (FieldRef::Missing, Value::Null) => true,
        _ => false,
    }
}
