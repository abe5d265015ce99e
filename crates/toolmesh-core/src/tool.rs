//! Tool descriptors and parameter schemas.
//!
//! A [`ToolDescriptor`] is immutable once registered. On the wire it travels as
//! a JSON Schema `inputSchema`; [`ToolDescriptor::input_schema`] and
//! [`ToolDescriptor::from_input_schema`] convert between the two shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::RegistryError;

/// Maximum length of a tool name, in bytes.
pub const MAX_TOOL_NAME_LEN: usize = 128;

/// JSON type accepted by a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Number,
    Integer,
    String,
    Boolean,
    Object,
    Array,
    /// No type constraint (schema property without a recognised `type`).
    Any,
}

impl ParamType {
    /// JSON Schema type keyword, `None` for [`ParamType::Any`].
    pub fn schema_type(&self) -> Option<&'static str> {
        match self {
            ParamType::Number => Some("number"),
            ParamType::Integer => Some("integer"),
            ParamType::String => Some("string"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Object => Some("object"),
            ParamType::Array => Some("array"),
            ParamType::Any => None,
        }
    }

    /// Parse a JSON Schema type keyword. Unknown keywords map to `Any`.
    pub fn from_schema_type(keyword: &str) -> Self {
        match keyword {
            "number" => ParamType::Number,
            "integer" => ParamType::Integer,
            "string" => ParamType::String,
            "boolean" => ParamType::Boolean,
            "object" => ParamType::Object,
            "array" => ParamType::Array,
            _ => ParamType::Any,
        }
    }

    /// Check whether a JSON value satisfies this type.
    ///
    /// `Integer` only accepts JSON integers; `Number` accepts any JSON number.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::String => value.is_string(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_type().unwrap_or("any"))
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// A parameter the caller must supply.
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    /// A parameter the caller may omit.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        }
    }
}

/// Describes a callable tool: its name, purpose and parameter schema.
///
/// Parameters keep their declaration order so that catalogs listed twice
/// compare equal in content and order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor without parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter (builder style).
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameters the caller must supply.
    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// Check the tool name and that no parameter is declared twice.
    pub fn validate(&self) -> Result<(), RegistryError> {
        validate_tool_name(&self.name)?;

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(RegistryError::DuplicateParameter {
                    tool: self.name.clone(),
                    parameter: param.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Render the parameters as a JSON Schema object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = Map::new();
            if let Some(keyword) = param.param_type.schema_type() {
                property.insert("type".to_string(), Value::from(keyword));
            }
            if !param.description.is_empty() {
                property.insert(
                    "description".to_string(),
                    Value::from(param.description.clone()),
                );
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }

        let required: Vec<Value> = self
            .required_params()
            .map(|p| Value::from(p.name.clone()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// Rebuild a descriptor from a JSON Schema `inputSchema`.
    ///
    /// Lenient: a schema without `properties` yields no parameters, and a
    /// property without a recognised `type` becomes [`ParamType::Any`].
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Self {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(param_name, property)| ParamSpec {
                        name: param_name.clone(),
                        param_type: property
                            .get("type")
                            .and_then(Value::as_str)
                            .map(ParamType::from_schema_type)
                            .unwrap_or(ParamType::Any),
                        required: required.contains(param_name.as_str()),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// One-line signature, e.g. `add(a: number, b: number)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.param_type)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// Validate a tool name: 1-128 bytes from `[A-Za-z0-9_.-]`.
pub fn validate_tool_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(invalid("name exceeds 128 characters"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }
    Ok(())
}
