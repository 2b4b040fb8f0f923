use serde_json::{Map, Value};

use crate::error::FieldError;

/// Write-time validation hook for a collection.
///
/// `conform` receives the full candidate body (after merging, for updates)
/// and returns the fields to persist, or every violation it found.
pub trait Schema: Send + Sync {
    fn name(&self) -> &str;

    fn conform(&self, fields: Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>>;
}

/// Type a declared field is cast to before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    name: String,
    kind: FieldKind,
    required: bool,
}

/// Schema built from a list of typed fields. Undeclared fields are dropped.
#[derive(Debug, Clone)]
pub struct DeclaredSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl DeclaredSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required,
        });
        self
    }

    pub fn required(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name, kind, true)
    }

    pub fn optional(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name, kind, false)
    }
}

impl Schema for DeclaredSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn conform(&self, mut fields: Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
        let mut conformed = Map::new();
        let mut errors = Vec::new();

        for spec in &self.fields {
            let value = fields.remove(&spec.name).unwrap_or(Value::Null);
            if is_blank(&value) {
                if spec.required {
                    errors.push(FieldError::new(
                        &spec.name,
                        format!("`{}` is required", spec.name),
                    ));
                }
                continue;
            }

            match cast(spec.kind, &value) {
                Some(cast) => {
                    conformed.insert(spec.name.clone(), cast);
                }
                None => errors.push(FieldError::new(
                    &spec.name,
                    format!(
                        "`{}` must be {}, got {}",
                        spec.name,
                        describe(spec.kind),
                        value
                    ),
                )),
            }
        }

        if errors.is_empty() {
            Ok(conformed)
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn describe(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "a string",
        FieldKind::Integer => "an integer",
    }
}

fn cast(kind: FieldKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (FieldKind::Text, Value::String(_)) => Some(value.clone()),
        (FieldKind::Text, Value::Number(number)) => Some(Value::String(number.to_string())),
        (FieldKind::Text, Value::Bool(flag)) => Some(Value::String(flag.to_string())),
        (FieldKind::Integer, Value::Number(number)) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                    .map(|float| float as i64)
            })
            .map(Value::from),
        (FieldKind::Integer, Value::String(text)) => text.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}
