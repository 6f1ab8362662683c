//! Callable functions the model may invoke, with schema-validated arguments.

use std::sync::Arc;

use errors::FlowError;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The invocation envelope the model is asked to reply with: the function
/// name plus a JSON object of arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInvocation {
    pub name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

type Handler = dyn Fn(Value) -> Result<Value, FlowError> + Send + Sync;

/// A function exposed to the model for one completion.
///
/// The parameter schema is declared explicitly as a JSON schema and compiled
/// at construction; [`Function::invoke`] validates the model-supplied
/// arguments against it before the handler runs, so handlers can assume the
/// shape they declared.
pub struct Function {
    name: String,
    description: String,
    parameters: Value,
    compiled: JSONSchema,
    handler: Arc<Handler>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: impl Fn(Value) -> Result<Value, FlowError> + Send + Sync + 'static,
    ) -> Result<Self, FlowError> {
        let name = name.into();
        let compiled =
            JSONSchema::compile(&parameters).map_err(|err| FlowError::InvalidFunctionCall {
                reason: format!("invalid parameter schema for function {name}: {err}"),
            })?;
        Ok(Self {
            name,
            description: description.into(),
            parameters,
            compiled,
            handler: Arc::new(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The declared parameter schema, as given at construction.
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Checks the arguments against the parameter schema. The error string
    /// lists every violation and doubles as correction feedback.
    pub fn validate_arguments(&self, arguments: &Value) -> Result<(), String> {
        if let Err(violations) = self.compiled.validate(arguments) {
            let reasons: Vec<String> = violations.map(|err| err.to_string()).collect();
            return Err(format!(
                "invalid arguments for function {}: {}",
                self.name,
                reasons.join("; ")
            ));
        }
        Ok(())
    }

    /// Validates the arguments and runs the handler. Schema violations become
    /// [`FlowError::InvalidFunctionCall`]; handler errors propagate as-is.
    pub fn invoke(&self, arguments: Value) -> Result<Value, FlowError> {
        self.validate_arguments(&arguments)
            .map_err(|reason| FlowError::InvalidFunctionCall { reason })?;
        (self.handler)(arguments)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greet() -> Function {
        Function::new(
            "greet",
            "Greet the user by name.",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
            |args| {
                let name = args["name"].as_str().unwrap_or_default();
                Ok(Value::String(format!("Hello {name}")))
            },
        )
        .unwrap()
    }

    #[test]
    fn invoke_runs_the_handler_on_valid_arguments() {
        let result = greet().invoke(json!({"name": "John"})).unwrap();
        assert_eq!(result, json!("Hello John"));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let err = greet().invoke(json!({})).unwrap_err();
        assert!(matches!(err, FlowError::InvalidFunctionCall { .. }));
    }

    #[test]
    fn wrong_argument_type_is_rejected() {
        let err = greet().invoke(json!({"name": 123})).unwrap_err();
        assert!(matches!(err, FlowError::InvalidFunctionCall { .. }));
    }

    #[test]
    fn handler_errors_propagate_unmapped() {
        let failing = Function::new(
            "boom",
            "Always fails.",
            json!({"type": "object"}),
            |_| {
                Err(FlowError::InvalidProviders {
                    reason: "handler failure".into(),
                })
            },
        )
        .unwrap();
        let err = failing.invoke(json!({})).unwrap_err();
        assert!(matches!(err, FlowError::InvalidProviders { .. }));
    }

    #[test]
    fn invocation_arguments_default_to_an_empty_object() {
        let invocation: FunctionInvocation =
            serde_json::from_str(r#"{"name": "greet"}"#).unwrap();
        assert_eq!(invocation.arguments, json!({}));
    }

    #[test]
    fn unparseable_schema_is_a_construction_error() {
        let err = Function::new(
            "bad",
            "Schema is not a schema.",
            json!({"type": 42}),
            |args| Ok(args),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidFunctionCall { .. }));
    }
}
