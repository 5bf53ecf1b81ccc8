use arbor_llm::{ParamType, Property};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Arguments must be a JSON object, got {found}")]
    NotAnObject { found: String },

    #[error("Missing required parameter '{name}'")]
    MissingRequired { name: String },

    #[error("Parameter '{path}' should be {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: ParamType,
        found: String,
    },

    #[error("Parameter '{path}' must be one of {allowed}, got {found}")]
    NotInEnum {
        path: String,
        allowed: String,
        found: String,
    },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },
}

/// Check tool-call arguments against a parameter schema
///
/// Covers required presence, primitive types and enum membership,
/// descending into nested objects and array items. Top-level names the
/// schema does not declare are rejected when the schema declares any.
pub fn validate_arguments(schema: &Property, arguments: &Value) -> Result<(), ValidationError> {
    let object = arguments.as_object().ok_or_else(|| ValidationError::NotAnObject {
        found: json_type(arguments).to_string(),
    })?;

    if !schema.properties.is_empty() {
        if let Some(name) = object.keys().find(|k| !schema.properties.contains_key(*k)) {
            return Err(ValidationError::UnknownParameter { name: name.clone() });
        }
    }

    check_object(schema, object, "")
}

fn check_object(schema: &Property, object: &serde_json::Map<String, Value>, prefix: &str) -> Result<(), ValidationError> {
    for name in &schema.required {
        if !object.contains_key(name) {
            return Err(ValidationError::MissingRequired {
                name: join(prefix, name),
            });
        }
    }

    for (name, value) in object {
        if let Some(property) = schema.properties.get(name) {
            check_value(property, value, &join(prefix, name))?;
        }
    }
    Ok(())
}

fn check_value(property: &Property, value: &Value, path: &str) -> Result<(), ValidationError> {
    if let Some(expected) = property.kind {
        if !expected.matches(value) {
            return Err(ValidationError::TypeMismatch {
                path: path.to_string(),
                expected,
                found: json_type(value).to_string(),
            });
        }
    }

    if !property.enum_values.is_empty() && !property.enum_values.contains(value) {
        let allowed: Vec<String> = property.enum_values.iter().map(Value::to_string).collect();
        return Err(ValidationError::NotInEnum {
            path: path.to_string(),
            allowed: format!("[{}]", allowed.join(", ")),
            found: value.to_string(),
        });
    }

    match value {
        Value::Object(object) => check_object(property, object, path),
        Value::Array(items) => match &property.items {
            Some(item_schema) => {
                for (index, item) in items.iter().enumerate() {
                    check_value(item_schema, item, &format!("{}[{}]", path, index))?;
                }
                Ok(())
            }
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Property {
        Property::object()
            .with_property("path", Property::string(), true)
            .with_property("limit", Property::integer(), false)
            .with_property(
                "mode",
                Property::string().with_enum([json!("read"), json!("write")]),
                false,
            )
            .with_property(
                "options",
                Property::object().with_property("recursive", Property::boolean(), true),
                false,
            )
            .with_property("tags", Property::array(Property::string()), false)
    }

    #[test]
    fn test_valid_arguments() {
        let args = json!({
            "path": "/tmp",
            "limit": 10,
            "mode": "read",
            "options": { "recursive": true },
            "tags": ["a", "b"]
        });
        assert!(validate_arguments(&schema(), &args).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &json!({ "limit": 1 })).unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired { name: "path".into() });

        let err = validate_arguments(&schema(), &json!({ "path": "x", "options": {} })).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                name: "options.recursive".into()
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = validate_arguments(&schema(), &json!({ "path": 5 })).unwrap_err();
        match err {
            ValidationError::TypeMismatch { path, expected, found } => {
                assert_eq!(path, "path");
                assert_eq!(expected, ParamType::String);
                assert_eq!(found, "integer");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }

        let err = validate_arguments(&schema(), &json!({ "path": "x", "limit": 1.5 })).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
        assert!(validate_arguments(&schema(), &json!({ "path": "x", "limit": 2.0 })).is_ok());

        let err = validate_arguments(&schema(), &json!({ "path": "x", "tags": ["a", 2] })).unwrap_err();
        match err {
            ValidationError::TypeMismatch { path, .. } => assert_eq!(path, "tags[1]"),
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_membership() {
        let err = validate_arguments(&schema(), &json!({ "path": "x", "mode": "delete" })).unwrap_err();
        match err {
            ValidationError::NotInEnum { path, found, .. } => {
                assert_eq!(path, "mode");
                assert_eq!(found, "\"delete\"");
            }
            other => panic!("Expected NotInEnum, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_non_object() {
        let err = validate_arguments(&schema(), &json!({ "path": "x", "force": true })).unwrap_err();
        assert_eq!(err, ValidationError::UnknownParameter { name: "force".into() });

        let err = validate_arguments(&schema(), &json!(["path"])).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnObject { .. }));

        // A schema without declared properties accepts any object
        assert!(validate_arguments(&Property::object(), &json!({ "any": 1 })).is_ok());
    }
}
