use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ApplicationError;

/// JSON type expected for a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCode {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl TypeCode {
    /// Returns the type code that describes `value`. `Null` maps to `Any`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Any,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match (self, Self::of(value)) {
            (Self::Any, _) | (Self::Float, Self::Integer) => true,
            (expected, actual) => expected == actual,
        }
    }
}

/// Single property definition within an [`ObjectSchema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    /// Name of the property.
    pub name: String,
    /// Expected JSON type.
    pub type_code: TypeCode,
    /// Whether the property must be present and non-null.
    pub required: bool,
    /// Nested schema applied to object values, or to every element of array values.
    pub schema: Option<ObjectSchema>,
}

/// Schema for a JSON object, used to validate command and route parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Property definitions that comprise this schema.
    pub properties: Vec<PropertySchema>,
    /// Whether properties not listed in `properties` are tolerated.
    pub allow_undefined: bool,
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl ObjectSchema {
    /// Creates a schema that tolerates undefined properties.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            allow_undefined: true,
        }
    }

    /// Rejects properties that are not declared.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.allow_undefined = false;
        self
    }

    #[must_use]
    pub fn with_required_property(mut self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            type_code,
            required: true,
            schema: None,
        });
        self
    }

    #[must_use]
    pub fn with_optional_property(mut self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            type_code,
            required: false,
            schema: None,
        });
        self
    }

    /// Adds a property whose value is an object (or array of objects) checked
    /// against `schema`.
    #[must_use]
    pub fn with_nested(
        mut self,
        name: impl Into<String>,
        type_code: TypeCode,
        required: bool,
        schema: ObjectSchema,
    ) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            type_code,
            required,
            schema: Some(schema),
        });
        self
    }

    /// Validates `value` and collects every failure.
    #[must_use]
    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut errors = Vec::new();
        self.validate_at("", value, &mut errors);
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { errors }
        }
    }

    /// Validates `value` and converts failures into a `400 INVALID_DATA` error
    /// listing the messages under `details.errors`.
    ///
    /// # Errors
    ///
    /// Returns a bad request error when the value does not conform.
    pub fn validate_and_throw(
        &self,
        correlation_id: Option<&str>,
        value: &Value,
    ) -> Result<(), ApplicationError> {
        match self.validate(value) {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => {
                let message = format!("Invalid data: {}", errors.join("; "));
                Err(
                    ApplicationError::bad_request(correlation_id, "INVALID_DATA", message)
                        .with_details("errors", json!(errors)),
                )
            }
        }
    }

    fn validate_at(&self, path: &str, value: &Value, errors: &mut Vec<String>) {
        let Some(object) = value.as_object() else {
            if !value.is_null() {
                errors.push(format!(
                    "{}: expected object but found {:?}",
                    display_path(path),
                    TypeCode::of(value)
                ));
            }
            return;
        };

        for property in &self.properties {
            let child_path = join_path(path, &property.name);
            match object.get(&property.name) {
                None | Some(Value::Null) => {
                    if property.required {
                        errors.push(format!("{child_path}: value is required"));
                    }
                }
                Some(child) => property.validate_value(&child_path, child, errors),
            }
        }

        if !self.allow_undefined {
            for key in object.keys() {
                if !self.properties.iter().any(|p| &p.name == key) {
                    errors.push(format!("{}: property is not defined", join_path(path, key)));
                }
            }
        }
    }
}

impl PropertySchema {
    fn validate_value(&self, path: &str, value: &Value, errors: &mut Vec<String>) {
        if !self.type_code.accepts(value) {
            errors.push(format!(
                "{path}: expected {:?} but found {:?}",
                self.type_code,
                TypeCode::of(value)
            ));
            return;
        }

        let Some(nested) = &self.schema else {
            return;
        };
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    nested.validate_at(&format!("{path}[{index}]"), item, errors);
                }
            }
            other => nested.validate_at(path, other, errors),
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "value"
    } else {
        path
    }
}
