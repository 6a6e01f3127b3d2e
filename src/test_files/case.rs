#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    constants::HIDDEN_FAILURE_MESSAGE,
    evaluator::Evaluator,
    util::{MESSAGE_TRUNCATE, explain_mismatch, normalize_output, truncate_with_notice},
};

/// One prompt of a doctest-style body: the code to run and, optionally, the
/// transcript it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctestStep {
    /// Code following the `>>>` prompt (and any `...` continuations).
    pub code:     String,
    /// Expected transcript. `None` means the step only has to run without
    /// error.
    pub expected: Option<String>,
}

impl DoctestStep {
    /// Creates a new step.
    pub fn new(code: impl Into<String>, expected: Option<String>) -> Self {
        Self {
            code: code.into(),
            expected,
        }
    }
}

/// Error behavior a script body is expected to show.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// The body must run without raising.
    #[default]
    Succeeds,
    /// The body must raise, optionally an error of a specific kind.
    Raises {
        /// Required error kind, any kind when `None`.
        kind: Option<String>,
    },
}

/// The executable check of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseBody {
    /// Structured assertion: code plus expected transcript, step by step.
    Doctest {
        /// Steps in execution order.
        steps: Vec<DoctestStep>,
    },
    /// Free-form script that must raise or not raise.
    Script {
        /// Script source handed to the evaluator.
        source: String,
        /// Expected error behavior.
        expect: ExpectedOutcome,
    },
}

/// A single executable check with a name and a weight.
#[derive(Debug, Clone, PartialEq, Builder, Serialize)]
#[builder(on(String, into))]
pub struct TestCase {
    /// Identifier, unique within its test file.
    name:            String,
    /// What to run.
    body:            CaseBody,
    /// Whether failure detail is withheld from the result message.
    #[builder(default)]
    hidden:          bool,
    /// Explicit weight, inferred by the test file when absent.
    points:          Option<f64>,
    /// Message reported when the case passes.
    success_message: Option<String>,
    /// Message reported when the case fails.
    failure_message: Option<String>,
}

impl TestCase {
    /// Returns the case name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the case body.
    pub fn body(&self) -> &CaseBody {
        &self.body
    }

    /// Returns whether the case is hidden.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Returns the explicit points, if any.
    pub fn points(&self) -> Option<f64> {
        self.points
    }

    /// Returns the message reported on success, if any.
    pub fn success_message(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    /// Returns the message reported on failure, if any.
    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    /// Runs the body against `context` and classifies the outcome. Errors
    /// raised by the body never escape; they become a failed result.
    pub fn evaluate<E>(
        &self,
        index: usize,
        evaluator: &E,
        context: &mut E::Context,
        verbose: bool,
    ) -> TestCaseResult
    where
        E: Evaluator + ?Sized,
    {
        let outcome = match &self.body {
            CaseBody::Doctest { steps } => run_doctest(steps, evaluator, context),
            CaseBody::Script { source, expect } => run_script(source, expect, evaluator, context),
        };

        let (passed, message) = match outcome {
            Ok(()) => {
                let message = match (&self.success_message, verbose) {
                    (_, false) => String::new(),
                    (Some(message), true) => message.clone(),
                    (None, true) => format!("{} passed", self.name),
                };
                (true, message)
            }
            Err(_) if self.hidden => (
                false,
                self.failure_message
                    .clone()
                    .unwrap_or_else(|| HIDDEN_FAILURE_MESSAGE.to_string()),
            ),
            Err(diagnostic) => {
                let diagnostic = truncate_with_notice(&diagnostic, MESSAGE_TRUNCATE);
                let message = match &self.failure_message {
                    Some(message) => format!("{message}\n\n{diagnostic}"),
                    None => diagnostic,
                };
                (false, message)
            }
        };

        TestCaseResult {
            name: self.name.clone(),
            index,
            passed,
            message,
        }
    }
}

/// Runs doctest steps in order, stopping at the first error or mismatch.
fn run_doctest<E>(steps: &[DoctestStep], evaluator: &E, context: &mut E::Context) -> Result<(), String>
where
    E: Evaluator + ?Sized,
{
    for step in steps {
        let evaluation = evaluator
            .evaluate(&step.code, context)
            .map_err(|failure| format!("Error while running:\n{}\n\n{failure}", step.code))?;

        if let Some(expected) = &step.expected {
            let expected = normalize_output(expected);
            let actual = normalize_output(&evaluation.transcript());
            if expected != actual {
                return Err(format!(
                    "Output did not match for:\n{}\n\n{}",
                    step.code,
                    explain_mismatch(&expected, &actual)
                ));
            }
        }
    }
    Ok(())
}

/// Runs a script body and checks its error behavior.
fn run_script<E>(
    source: &str,
    expect: &ExpectedOutcome,
    evaluator: &E,
    context: &mut E::Context,
) -> Result<(), String>
where
    E: Evaluator + ?Sized,
{
    match (evaluator.evaluate(source, context), expect) {
        (Ok(_), ExpectedOutcome::Succeeds) => Ok(()),
        (Err(failure), ExpectedOutcome::Succeeds) => Err(failure.to_string()),
        (Ok(_), ExpectedOutcome::Raises { kind: None }) => {
            Err("Expected an error to be raised, but none was".to_string())
        }
        (Ok(_), ExpectedOutcome::Raises { kind: Some(kind) }) => {
            Err(format!("Expected a `{kind}` error to be raised, but none was"))
        }
        (Err(_), ExpectedOutcome::Raises { kind: None }) => Ok(()),
        (Err(failure), ExpectedOutcome::Raises { kind: Some(kind) }) if failure.kind == *kind => {
            Ok(())
        }
        (Err(failure), ExpectedOutcome::Raises { kind: Some(kind) }) => {
            Err(format!("Expected a `{kind}` error to be raised, but got: {failure}"))
        }
    }
}

/// Outcome of running one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Name of the test case this result belongs to.
    name:    String,
    /// Position of that test case in its file.
    index:   usize,
    /// Whether the case passed.
    passed:  bool,
    /// Diagnostic or author message, empty for a quiet pass.
    message: String,
}

impl TestCaseResult {
    /// Returns the name of the test case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the position of the test case in its file.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns whether the case passed.
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Returns the result message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
