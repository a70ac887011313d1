//! Declarative schemas for input variable sets and stage outputs.

use crate::context::json_type_name as type_name;
use serde_json::{Map, Value};
use std::fmt;

/// The shape a field's value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Any JSON value.
    Any,
    /// A JSON string.
    String,
    /// A JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON object validated against a nested schema.
    Object(Schema),
    /// A JSON object whose values all have one kind.
    Map(Box<FieldKind>),
    /// A JSON array whose items all have one kind.
    List(Box<FieldKind>),
}

impl FieldKind {
    /// A map of values of `kind`.
    #[must_use]
    pub fn map_of(kind: Self) -> Self {
        Self::Map(Box::new(kind))
    }

    /// A list of values of `kind`.
    #[must_use]
    pub fn list_of(kind: Self) -> Self {
        Self::List(Box::new(kind))
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        match (self, value) {
            (Self::Any, _)
            | (Self::String, Value::String(_))
            | (Self::Boolean, Value::Bool(_))
            | (Self::Number, Value::Number(_)) => Ok(()),
            (Self::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            (Self::Object(schema), Value::Object(map)) => schema.validate_at(map, path),
            (Self::Map(inner), Value::Object(map)) => {
                for (key, item) in map {
                    inner.check(item, &join(path, key))?;
                }
                Ok(())
            }
            (Self::List(inner), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.check(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            (expected, actual) => Err(SchemaViolation::new(
                path,
                format!("expected {expected}, got {}", type_name(actual)),
            )),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Object(_) => write!(f, "object"),
            Self::Map(inner) => write!(f, "map of {inner}"),
            Self::List(inner) => write!(f, "list of {inner}"),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name as it appears in the JSON object.
    pub name: String,
    /// Expected value shape.
    pub kind: FieldKind,
    /// Whether the field must be present and non-null.
    pub required: bool,
}

/// A set of field declarations for a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    allow_extra: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            allow_extra: true,
        }
    }
}

impl Schema {
    /// Creates a schema with no declared fields that accepts any object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field that must be present and non-null.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// Declares a field that may be absent or null.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Rejects fields that are not declared.
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.allow_extra = false;
        self
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates an object against the schema.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, in declaration order.
    pub fn validate(&self, value: &Map<String, Value>) -> Result<(), SchemaViolation> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Map<String, Value>, path: &str) -> Result<(), SchemaViolation> {
        for field in &self.fields {
            let field_path = join(path, &field.name);
            match value.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaViolation::new(field_path, "field required"));
                }
                None | Some(Value::Null) => {}
                Some(v) => field.kind.check(v, &field_path)?,
            }
        }
        if !self.allow_extra {
            if let Some(extra) = value.keys().find(|k| !self.fields.iter().any(|f| &f.name == *k)) {
                return Err(SchemaViolation::new(join(path, extra), "extra field not permitted"));
            }
        }
        Ok(())
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path of the offending field.
    pub path: String,
    /// What was wrong.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a violation.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field '{}': {}", self.path, self.message)
    }
}

impl std::error::Error for SchemaViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn services_schema() -> Schema {
        Schema::new()
            .required("name", FieldKind::String)
            .required(
                "node_groups",
                FieldKind::map_of(FieldKind::map_of(FieldKind::String)),
            )
            .optional("cert_secret_name", FieldKind::String)
            .required(
                "jupyterlab-profiles",
                FieldKind::list_of(FieldKind::Object(
                    Schema::new()
                        .required("display_name", FieldKind::String)
                        .required("default", FieldKind::Boolean),
                )),
            )
    }

    #[test]
    fn test_valid_object_passes() {
        let value = object(json!({
            "name": "demo",
            "node_groups": {"general": {"key": "pool", "value": "general"}},
            "cert_secret_name": null,
            "jupyterlab-profiles": [{"display_name": "Small", "default": true}],
            "unrelated": 1
        }));
        assert_eq!(services_schema().validate(&value), Ok(()));
    }

    #[test]
    fn test_missing_required_field_names_it() {
        let value = object(json!({
            "node_groups": {},
            "jupyterlab-profiles": []
        }));
        let err = services_schema().validate(&value).unwrap_err();
        assert_eq!(err.path, "name");
        assert_eq!(err.message, "field required");
    }

    #[test]
    fn test_nested_paths_are_reported() {
        let value = object(json!({
            "name": "demo",
            "node_groups": {"general": {"key": 5}},
            "jupyterlab-profiles": []
        }));
        let err = services_schema().validate(&value).unwrap_err();
        assert_eq!(err.path, "node_groups.general.key");
        assert_eq!(err.message, "expected string, got number");

        let value = object(json!({
            "name": "demo",
            "node_groups": {},
            "jupyterlab-profiles": [{"display_name": "Small", "default": true}, {"default": false}]
        }));
        let err = services_schema().validate(&value).unwrap_err();
        assert_eq!(err.path, "jupyterlab-profiles[1].display_name");
    }

    #[test]
    fn test_strict_rejects_extra_fields() {
        let schema = Schema::new().required("x", FieldKind::Integer).strict();
        let err = schema.validate(&object(json!({"x": 1, "y": 2}))).unwrap_err();
        assert_eq!(err.path, "y");
    }

    #[test]
    fn test_integer_rejects_float() {
        let schema = Schema::new().required("x", FieldKind::Integer);
        assert!(schema.validate(&object(json!({"x": 1.5}))).is_err());
        assert!(Schema::new()
            .required("x", FieldKind::Number)
            .validate(&object(json!({"x": 1.5})))
            .is_ok());
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        assert!(Schema::new().validate(&object(json!({"a": [1, "b"]}))).is_ok());
    }
}
