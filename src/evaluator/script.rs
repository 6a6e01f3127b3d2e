#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{Result, ensure};
use otter_derive::script_variant;
use rhai::{AST, Dynamic, Engine, EvalAltResult, ImmutableString, Map, Position, Scope};

use super::{EvalFailure, Evaluation, Evaluator};
use crate::{config, error::CompileError};

/// Renders a value the way a doctest transcript shows it.
fn render(value: &Dynamic) -> String {
    format!("{value:?}")
}

#[script_variant("assertion")]
/// Fails unless `condition` holds.
fn assert_true(condition: bool) -> Result<()> {
    ensure!(condition, "assertion failed");
    Ok(())
}

#[script_variant("assertion")]
/// Fails with `message` unless `condition` holds.
fn assert_true_with_message(condition: bool, message: ImmutableString) -> Result<()> {
    ensure!(condition, "{message}");
    Ok(())
}

#[script_variant("assertion")]
/// Fails unless both values render identically.
fn assert_equal(left: Dynamic, right: Dynamic) -> Result<()> {
    let (left, right) = (render(&left), render(&right));
    ensure!(left == right, "assertion failed: {left} != {right}");
    Ok(())
}

#[script_variant("assertion")]
/// Fails if both values render identically.
fn assert_not_equal(left: Dynamic, right: Dynamic) -> Result<()> {
    let (left, right) = (render(&left), render(&right));
    ensure!(left != right, "assertion failed: {left} == {right}");
    Ok(())
}

/// Script-facing `raise(kind, message)`, so test authors can throw errors of a
/// specific kind.
fn raise(kind: ImmutableString, message: ImmutableString) -> Result<(), Box<EvalAltResult>> {
    let mut payload = Map::new();
    payload.insert("kind".into(), Dynamic::from(kind));
    payload.insert("message".into(), Dynamic::from(message));
    Err(Box::new(EvalAltResult::ErrorRuntime(Dynamic::from_map(payload), Position::NONE)))
}

/// Turns a thrown value into a failure. Object maps with `kind`/`message`
/// fields keep their kind, anything else is a plain runtime error.
fn thrown(value: &Dynamic) -> EvalFailure {
    match value.clone().try_cast::<Map>() {
        Some(map) => EvalFailure::new(
            map.get("kind")
                .map(ToString::to_string)
                .unwrap_or_else(|| "runtime".to_string()),
            map.get("message")
                .map(ToString::to_string)
                .unwrap_or_else(|| render(value)),
        ),
        None => EvalFailure::new("runtime", value.to_string()),
    }
}

/// Maps an engine error to a failure kind.
fn classify(err: &EvalAltResult) -> EvalFailure {
    let kind = match err {
        EvalAltResult::ErrorRuntime(value, _) => return thrown(value),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => return classify(inner),
        EvalAltResult::ErrorTerminated(..) | EvalAltResult::ErrorTooManyOperations(..) => "timeout",
        EvalAltResult::ErrorVariableNotFound(..) | EvalAltResult::ErrorFunctionNotFound(..) => "name",
        EvalAltResult::ErrorParsing(..) => "syntax",
        EvalAltResult::ErrorMismatchDataType(..) | EvalAltResult::ErrorMismatchOutputType(..) => {
            "type"
        }
        EvalAltResult::ErrorArithmetic(..) => "arithmetic",
        EvalAltResult::ErrorArrayBounds(..)
        | EvalAltResult::ErrorStringBounds(..)
        | EvalAltResult::ErrorIndexNotFound(..)
        | EvalAltResult::ErrorPropertyNotFound(..) => "index",
        _ => "runtime",
    };
    EvalFailure::new(kind, err.to_string())
}

/// Name/value bindings produced by running a submission. Test bodies read
/// and mutate it; top-level `let` statements and `fn` definitions in one
/// evaluation stay visible to the next.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// Underlying rhai scope.
    scope:     Scope<'static>,
    /// Functions defined by earlier evaluations.
    functions: AST,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn set(&mut self, name: &str, value: impl Into<Dynamic>) {
        let value = value.into();
        match self.scope.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.scope.push_dynamic(name, value);
            }
        }
    }

    /// Builder-style variant of [`ExecutionContext::set`].
    pub fn with(mut self, name: &str, value: impl Into<Dynamic>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns a copy of the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.scope.get(name).cloned()
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.scope.contains(name)
    }
}

/// Evaluates test logic written in rhai.
///
/// Besides the rhai standard library, scripts get `assert(cond)`,
/// `assert(cond, message)`, `assert_eq(a, b)`, `assert_ne(a, b)` and
/// `raise(kind, message)`. `print`/`debug` output is captured per
/// evaluation. Evaluations through a shared evaluator run one at a time.
pub struct RhaiEvaluator {
    /// The engine with all helpers registered.
    engine:  Engine,
    /// Output captured from `print`/`debug` during the current evaluation.
    printed: Arc<Mutex<String>>,
    /// When the current evaluation started, read by the deadline hook.
    started: Arc<Mutex<Option<Instant>>>,
    /// Held for a whole evaluation so capture and clock are never shared.
    running: Mutex<()>,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEvaluator {
    /// Creates an evaluator without deadline or operation budget.
    pub fn new() -> Self {
        Self::with_limits(None, 0)
    }

    /// Creates an evaluator with the limits from the process configuration.
    pub fn from_config() -> Self {
        Self::with_limits(config::case_timeout(), config::max_operations())
    }

    /// Creates an evaluator that aborts any single evaluation running longer
    /// than `deadline` or for more than `max_operations` operations (`0` for
    /// no budget).
    pub fn with_limits(deadline: Option<Duration>, max_operations: u64) -> Self {
        let printed = Arc::new(Mutex::new(String::new()));
        let started = Arc::new(Mutex::new(None::<Instant>));

        let mut engine = Engine::new();
        if max_operations > 0 {
            engine.set_max_operations(max_operations);
        }

        let sink = Arc::clone(&printed);
        engine.on_print(move |text| {
            let mut buf = sink.lock().expect("print buffer poisoned");
            buf.push_str(text);
            buf.push('\n');
        });
        let sink = Arc::clone(&printed);
        engine.on_debug(move |text, _source, _pos| {
            let mut buf = sink.lock().expect("print buffer poisoned");
            buf.push_str(text);
            buf.push('\n');
        });

        if let Some(limit) = deadline {
            let clock = Arc::clone(&started);
            engine.on_progress(move |_ops| {
                let started = *clock.lock().expect("evaluation clock poisoned");
                match started {
                    Some(at) if at.elapsed() > limit => Some(Dynamic::from(format!(
                        "evaluation exceeded the {:.2}s deadline",
                        limit.as_secs_f64()
                    ))),
                    _ => None,
                }
            });
        }

        engine
            .register_fn("assert", assert_true_script)
            .register_fn("assert", assert_true_with_message_script)
            .register_fn("assert_eq", assert_equal_script)
            .register_fn("assert_ne", assert_not_equal_script)
            .register_fn("raise", raise);

        Self {
            engine,
            printed,
            started,
            running: Mutex::new(()),
        }
    }
}

impl Evaluator for RhaiEvaluator {
    type Context = ExecutionContext;

    fn name(&self) -> &str {
        "rhai"
    }

    fn compile(&self, source: &str, origin: &str) -> Result<(), CompileError> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| CompileError::new(origin, e.to_string()))
    }

    fn evaluate(
        &self,
        source: &str,
        context: &mut ExecutionContext,
    ) -> Result<Evaluation, EvalFailure> {
        let _running = self.running.lock().expect("evaluator poisoned");
        self.printed.lock().expect("print buffer poisoned").clear();
        *self.started.lock().expect("evaluation clock poisoned") = Some(Instant::now());

        let outcome = match self.engine.compile_with_scope(&context.scope, source) {
            Ok(ast) => {
                let ast = context.functions.merge(&ast);
                context.functions = ast.clone_functions_only();
                self.engine
                    .eval_ast_with_scope::<Dynamic>(&mut context.scope, &ast)
            }
            Err(err) => Err(err.into()),
        };

        *self.started.lock().expect("evaluation clock poisoned") = None;
        let printed = std::mem::take(&mut *self.printed.lock().expect("print buffer poisoned"));

        match outcome {
            Ok(value) => Ok(Evaluation {
                printed,
                value: (!value.is_unit()).then(|| render(&value)),
            }),
            Err(err) => Err(classify(&err)),
        }
    }
}
