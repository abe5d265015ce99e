//! Argument validation against a tool's parameter schema.

use serde_json::Value;
use toolmesh_core::{Arguments, ToolDescriptor, ToolError, ToolResult};

/// Validate `arguments` against `descriptor` and return the arguments the
/// handler will see.
///
/// - every required parameter must be present and non-null;
/// - every supplied, declared parameter must match its type;
/// - `null` for an optional parameter is treated as absent and dropped;
/// - arguments not named in the schema are ignored and dropped.
pub fn validate_arguments(descriptor: &ToolDescriptor, arguments: &Arguments) -> ToolResult<Arguments> {
    let mut validated = Arguments::new();

    for param in &descriptor.parameters {
        match arguments.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ToolError::invalid_argument(
                        &param.name,
                        "missing required parameter",
                    ));
                }
            }
            Some(value) => {
                if !param.param_type.accepts(value) {
                    return Err(ToolError::invalid_argument(
                        &param.name,
                        format!("expected {}, got {}", param.param_type, json_type_name(value)),
                    ));
                }
                validated.insert(param.name.clone(), value.clone());
            }
        }
    }

    Ok(validated)
}

fn json_type_name(value: &Value) -> &'static str {
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
    use rstest::rstest;
    use serde_json::json;
    use toolmesh_core::{ParamSpec, ParamType};

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("lookup", "")
            .with_param(ParamSpec::required("city", ParamType::String, ""))
            .with_param(ParamSpec::optional("days", ParamType::Integer, ""))
    }

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    #[test]
    fn test_valid_arguments_pass_through() {
        let validated =
            validate_arguments(&descriptor(), &args(json!({"city": "Hanoi", "days": 3}))).unwrap();
        assert_eq!(validated.get("city"), Some(&json!("Hanoi")));
        assert_eq!(validated.get("days"), Some(&json!(3)));
    }

    #[test]
    fn test_extra_arguments_dropped() {
        let validated =
            validate_arguments(&descriptor(), &args(json!({"city": "Hanoi", "units": "metric"})))
                .unwrap();
        assert!(!validated.contains_key("units"));
    }

    #[test]
    fn test_null_optional_is_absent() {
        let validated =
            validate_arguments(&descriptor(), &args(json!({"city": "Hanoi", "days": null})))
                .unwrap();
        assert!(!validated.contains_key("days"));
    }

    #[rstest]
    #[case(json!({}), "city")]
    #[case(json!({"city": null}), "city")]
    #[case(json!({"city": 42}), "city")]
    #[case(json!({"city": "Hanoi", "days": 2.5}), "days")]
    #[case(json!({"city": "Hanoi", "days": "two"}), "days")]
    fn test_invalid_arguments(#[case] input: Value, #[case] bad_param: &str) {
        match validate_arguments(&descriptor(), &args(input)) {
            Err(ToolError::InvalidArgument { parameter, .. }) => assert_eq!(parameter, bad_param),
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = validate_arguments(&descriptor(), &args(json!({"city": true}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument 'city': expected string, got boolean"
        );
    }
}
