//! Prompt templates for the structured completion modes.
//!
//! Templates are embedded at compile time and rendered with minijinja. Each
//! render wraps the caller's prompt with the instructions that make the model
//! answer in a machine-parseable shape.

use std::sync::OnceLock;

use errors::FlowError;
use minijinja::{Environment, context};
use serde_json::Value;

use crate::function::Function;

const OUTPUT_FORMATTER: &str = include_str!("templates/output_formatter.j2");
const REQUIRED_FUNCTIONS: &str = include_str!("templates/required_functions.j2");
const OPTIONAL_FUNCTIONS: &str = include_str!("templates/optional_functions.j2");

fn environment() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        // Embedded templates are known-good; failures here are build defects.
        for (name, source) in [
            ("output_formatter", OUTPUT_FORMATTER),
            ("required_functions", REQUIRED_FUNCTIONS),
            ("optional_functions", OPTIONAL_FUNCTIONS),
        ] {
            if let Err(err) = env.add_template(name, source) {
                tracing::error!(template = name, error = %err, "embedded template failed to parse");
            }
        }
        env
    })
}

fn render(name: &str, ctx: minijinja::Value) -> Result<String, FlowError> {
    let template = environment()
        .get_template(name)
        .map_err(|err| FlowError::Template {
            reason: err.to_string(),
        })?;
    template.render(ctx).map_err(|err| FlowError::Template {
        reason: err.to_string(),
    })
}

fn function_context(functions: &[Function]) -> Vec<Value> {
    functions
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name(),
                "description": f.description(),
                // Pre-serialized so the template prints compact JSON instead
                // of a templated map.
                "parameters": f.parameters().to_string(),
            })
        })
        .collect()
}

/// Wraps the prompt with instructions to answer as JSON matching `json_schema`.
pub fn render_output_formatter(prompt: &str, json_schema: &str) -> Result<String, FlowError> {
    render(
        "output_formatter",
        context! { prompt => prompt, json_schema => json_schema },
    )
}

/// Wraps the prompt with the function catalog; a function call is mandatory.
pub fn render_required_functions(
    prompt: &str,
    functions: &[Function],
) -> Result<String, FlowError> {
    render(
        "required_functions",
        context! { prompt => prompt, functions => function_context(functions) },
    )
}

/// Wraps the prompt with the function catalog; a plain answer stays allowed.
pub fn render_optional_functions(
    prompt: &str,
    functions: &[Function],
) -> Result<String, FlowError> {
    render(
        "optional_functions",
        context! { prompt => prompt, functions => function_context(functions) },
    )
}
