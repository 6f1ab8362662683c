//! # Chatflow Orchestrator
//!
//! [`Flow`] ties a set of chat providers to one conversation's message
//! history. It owns the control loops the providers themselves stay out of:
//! token-budget truncation before each request, retries on transient provider
//! unavailability, rollback of the user message when a completion fails, and
//! the auto-fixer loop that feeds validation errors back to the model as
//! correction prompts.
//!
//! On top of the plain [`Flow::completion`] it offers two structured modes:
//! [`Flow::completion_with_output_formatter`] parses the reply into a typed
//! value via its JSON schema, and [`Flow::completion_with_functions`] lets the
//! model invoke registered [`Function`]s with schema-validated arguments.

pub mod flow;
pub mod function;
pub mod templates;

pub use flow::{DEFAULT_TOKEN_OFFSET, Flow};
pub use function::{Function, FunctionInvocation};
