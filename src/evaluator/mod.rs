#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The capability that compiles and runs test logic. Test files never run
//! code themselves; they hand script bodies to an [`Evaluator`] together with
//! the execution context the bodies should see.

/// Rhai-backed evaluator and execution context.
pub mod script;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::script::{ExecutionContext, RhaiEvaluator};
use crate::error::CompileError;

/// What a successful evaluation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Everything the code printed, in order.
    pub printed: String,
    /// Rendering of the resulting value, `None` when the code produced no
    /// value.
    pub value:   Option<String>,
}

impl Evaluation {
    /// Printed output followed by the rendered value, the way an interactive
    /// prompt would show it.
    pub fn transcript(&self) -> String {
        let mut out = self.printed.clone();
        if let Some(value) = &self.value {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(value);
        }
        out
    }
}

/// An error raised while evaluating test logic. Never propagated out of a
/// test run; it is folded into the failing case's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalFailure {
    /// Classification of the error, eg. `assertion`, `name`, `timeout`.
    pub kind:    String,
    /// Human readable description.
    pub message: String,
}

impl EvalFailure {
    /// Creates a new evaluation failure.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind:    kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EvalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// A pluggable engine that test bodies are compiled and evaluated with.
///
/// Each call to [`Evaluator::evaluate`] is one bounded unit of work: callers
/// that need deadlines apply them per call.
pub trait Evaluator {
    /// Bindings that evaluated code reads and mutates. Mutations made by one
    /// evaluation are visible to the next one that shares the context.
    type Context: Default;

    /// Stable identifier recorded in serialized artifacts.
    fn name(&self) -> &str;

    /// Checks that `source` is valid logic for this evaluator.
    /// * `origin`: where the source came from, for diagnostics.
    fn compile(&self, source: &str, origin: &str) -> Result<(), CompileError>;

    /// Evaluates `source` against `context`.
    fn evaluate(&self, source: &str, context: &mut Self::Context)
    -> Result<Evaluation, EvalFailure>;
}
