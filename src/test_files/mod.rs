#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Test files: ordered test cases with a point value and a grading mode.
//!
//! There is a single [`TestFile`] type tagged with a [`CaseKind`]. The
//! submodules hold the per-kind strategies for getting a [`TestSpec`] out of
//! its storage format.

/// Test cases and their results.
pub mod case;
/// Exception-format test sources.
pub mod exception;
/// Tests embedded in notebook metadata and the artifact codec.
pub mod metadata;
/// OK-format test specifications.
pub mod ok;

use std::{collections::HashSet, fmt, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use self::case::{CaseBody, ExpectedOutcome, TestCase, TestCaseResult};
use crate::{
    config, constants::DEFAULT_TEST_VALUE, error::TestFileError, evaluator::Evaluator,
    parsers::parse_doctest, types::Grade,
};

/// How the bodies of a test file's cases are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// Doctest-style bodies: code plus expected transcript.
    Ok,
    /// Script bodies that must raise or not raise.
    Exception,
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseKind::Ok => write!(f, "ok"),
            CaseKind::Exception => write!(f, "exception"),
        }
    }
}

/// `raises` field of a case specification: `true`/`false` or an error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RaisesSpec {
    /// Whether any error must be raised.
    Flag(bool),
    /// Kind of error that must be raised.
    Kind(String),
}

/// In-memory form of a single case, as written by test authors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    /// Case name.
    pub name:            String,
    /// Doctest transcript (OK format) or script (exception format).
    #[serde(alias = "code")]
    pub body:            String,
    /// Explicit weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points:          Option<f64>,
    /// Whether failure detail is withheld.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden:          Option<bool>,
    /// Expected error behavior, exception format only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raises:          Option<RaisesSpec>,
    /// Message reported when the case passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    /// Message reported when the case fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// In-memory form of a whole test file:
/// `{name, value?, all_or_nothing?, cases: [{name, points?, hidden?, body}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Test file name.
    pub name:           String,
    /// Total point value, defaults to 1.
    #[serde(default, alias = "points", skip_serializing_if = "Option::is_none")]
    pub value:          Option<f64>,
    /// Whether the file is graded all-or-nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_or_nothing: Option<bool>,
    /// Cases in execution order.
    pub cases:          Vec<CaseSpec>,
}

/// Knobs for a single run of a test file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report a message for passing cases too.
    pub verbose: bool,
}

impl RunOptions {
    /// Options taken from the process configuration.
    pub fn from_config() -> Self {
        Self {
            verbose: config::verbose(),
        }
    }
}

/// An ordered collection of test cases with a point value and a grading mode.
///
/// A `TestFile` is only ever built whole from a valid [`TestSpec`]. Results
/// are filled in by [`TestFile::run`] and the grade is derived from them.
#[derive(Debug, Clone)]
pub struct TestFile {
    /// Test file name.
    name:              String,
    /// Where the specification came from.
    path:              String,
    /// How case bodies are interpreted.
    kind:              CaseKind,
    /// Cases in execution order.
    test_cases:        Vec<TestCase>,
    /// Resolved weight of every case, parallel to `test_cases`.
    weights:           Vec<f64>,
    /// Total point value.
    value:             f64,
    /// Whether the grade is binary.
    all_or_nothing:    bool,
    /// Results of the last run, empty before the first one.
    test_case_results: Vec<TestCaseResult>,
}

impl TestFile {
    /// Builds a test file from a parsed specification, validating it as a
    /// whole.
    ///
    /// * `kind`: how the case bodies are to be interpreted
    /// * `spec`: the specification
    /// * `path`: provenance of the specification, may be synthetic
    pub fn from_spec(
        kind: CaseKind,
        spec: TestSpec,
        path: impl Into<String>,
    ) -> Result<Self, TestFileError> {
        let path = path.into();
        let malformed = |reason: String| TestFileError::malformed(path.clone(), reason);

        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(malformed("test name is empty".into()));
        }
        if spec.cases.is_empty() {
            return Err(malformed(format!("test `{name}` has no test cases")));
        }

        let value = spec.value.unwrap_or(DEFAULT_TEST_VALUE);
        if !value.is_finite() || value < 0.0 {
            return Err(malformed(format!("test `{name}` has an invalid value {value}")));
        }

        let mut seen = HashSet::new();
        let mut test_cases = Vec::with_capacity(spec.cases.len());
        for case in spec.cases {
            let case_name = case.name.trim().to_string();
            if case_name.is_empty() {
                return Err(malformed(format!("test `{name}` has a case without a name")));
            }
            if !seen.insert(case_name.clone()) {
                return Err(malformed(format!("test case `{case_name}` is defined more than once")));
            }
            if let Some(points) = case.points
                && (!points.is_finite() || points < 0.0)
            {
                return Err(malformed(format!("test case `{case_name}` has invalid points {points}")));
            }

            let body = match kind {
                CaseKind::Ok => {
                    if case.raises.is_some() {
                        return Err(malformed(format!(
                            "test case `{case_name}` uses `raises`, which OK-format tests do not \
                             support"
                        )));
                    }
                    let steps = parse_doctest(&case.body)
                        .map_err(|e| malformed(format!("test case `{case_name}`: {e}")))?;
                    CaseBody::Doctest { steps }
                }
                CaseKind::Exception => {
                    if case.body.trim().is_empty() {
                        return Err(malformed(format!("test case `{case_name}` has an empty body")));
                    }
                    let expect = match case.raises {
                        None | Some(RaisesSpec::Flag(false)) => ExpectedOutcome::Succeeds,
                        Some(RaisesSpec::Flag(true)) => ExpectedOutcome::Raises { kind: None },
                        Some(RaisesSpec::Kind(kind)) => ExpectedOutcome::Raises { kind: Some(kind) },
                    };
                    CaseBody::Script {
                        source: case.body,
                        expect,
                    }
                }
            };

            test_cases.push(
                TestCase::builder()
                    .name(case_name)
                    .body(body)
                    .hidden(case.hidden.unwrap_or(false))
                    .maybe_points(case.points)
                    .maybe_success_message(case.success_message)
                    .maybe_failure_message(case.failure_message)
                    .build(),
            );
        }

        let points = test_cases.iter().map(TestCase::points).collect::<Vec<_>>();
        let weights = resolve_weights(value, &points)
            .map_err(|reason| malformed(format!("test `{name}`: {reason}")))?;

        Ok(Self {
            name,
            path,
            kind,
            test_cases,
            weights,
            value,
            all_or_nothing: spec.all_or_nothing.unwrap_or(false),
            test_case_results: Vec::new(),
        })
    }

    /// Returns the test file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where the specification came from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns how case bodies are interpreted.
    pub fn kind(&self) -> CaseKind {
        self.kind
    }

    /// Returns the cases in execution order.
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Returns the resolved weight of every case, in execution order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the total point value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns whether the file is graded all-or-nothing.
    pub fn all_or_nothing(&self) -> bool {
        self.all_or_nothing
    }

    /// Returns the results of the last run, empty if the file never ran.
    pub fn test_case_results(&self) -> &[TestCaseResult] {
        &self.test_case_results
    }

    /// Whether the file has been run.
    pub fn has_run(&self) -> bool {
        !self.test_case_results.is_empty()
    }

    /// Whether the file has been run and every case passed.
    pub fn passed_all(&self) -> bool {
        self.has_run() && self.test_case_results.iter().all(TestCaseResult::passed)
    }

    /// Runs every case in declared order against `context`, replacing the
    /// results of any previous run.
    pub fn run<E>(&mut self, evaluator: &E, context: &mut E::Context)
    where
        E: Evaluator + ?Sized,
    {
        self.run_with(evaluator, context, RunOptions::default());
    }

    /// [`TestFile::run`] with explicit options.
    pub fn run_with<E>(&mut self, evaluator: &E, context: &mut E::Context, options: RunOptions)
    where
        E: Evaluator + ?Sized,
    {
        let mut results = Vec::with_capacity(self.test_cases.len());
        for (index, case) in self.test_cases.iter().enumerate() {
            let result = case.evaluate(index, evaluator, context, options.verbose);
            debug!(test = %self.name, case = case.name(), passed = result.passed(), "ran test case");
            results.push(result);
        }
        self.test_case_results = results;
    }

    /// Points earned: `value` or `0` when all-or-nothing, otherwise `value`
    /// scaled by the weight of the passing cases. `0` before the first run.
    pub fn grade(&self) -> f64 {
        if !self.has_run() {
            return 0.0;
        }

        if self.all_or_nothing {
            return if self.passed_all() { self.value } else { 0.0 };
        }

        let total: f64 = self.weights.iter().sum();
        let earned: f64 = self
            .test_case_results
            .iter()
            .filter(|result| result.passed())
            .map(|result| self.weights[result.index()])
            .sum();

        self.value * earned / total
    }

    /// Serializable snapshot of the file and its results.
    pub fn summary(&self) -> TestFileSummary {
        TestFileSummary {
            name:           self.name.clone(),
            path:           self.path.clone(),
            kind:           self.kind,
            grade:          Grade::new(self.grade(), self.value),
            all_or_nothing: self.all_or_nothing,
            passed_all:     self.passed_all(),
            results:        self.test_case_results.clone(),
        }
    }
}

/// Resolves the weight of every case from its optional points.
///
/// With no points anywhere every case weighs 1. With points everywhere the
/// points are the weights. Otherwise the cases without points share what is
/// left of `value` equally.
fn resolve_weights(value: f64, points: &[Option<f64>]) -> Result<Vec<f64>, String> {
    let specified: f64 = points.iter().flatten().sum();
    let unspecified = points.iter().filter(|p| p.is_none()).count();

    if unspecified == points.len() {
        return Ok(vec![1.0; points.len()]);
    }

    if unspecified == 0 {
        if specified <= 0.0 {
            return Err("case points add up to zero".to_string());
        }
        return Ok(points.iter().map(|p| p.unwrap_or_default()).collect());
    }

    let remainder = value - specified;
    if remainder <= 0.0 {
        return Err(format!(
            "explicit case points ({specified}) leave nothing of the test value ({value}) for the \
             {unspecified} case(s) without points"
        ));
    }

    let each = remainder / unspecified as f64;
    Ok(points.iter().map(|p| p.unwrap_or(each)).collect())
}

/// Reads a test source from disk.
pub(crate) fn read_source(path: &Path) -> Result<String, TestFileError> {
    std::fs::read_to_string(path).map_err(|source| TestFileError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Serializable snapshot of a test file after grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFileSummary {
    /// Test file name.
    pub name:           String,
    /// Where the specification came from.
    pub path:           String,
    /// How case bodies were interpreted.
    pub kind:           CaseKind,
    /// Points earned out of the file's value.
    pub grade:          Grade,
    /// Whether the file was graded all-or-nothing.
    pub all_or_nothing: bool,
    /// Whether every case passed.
    pub passed_all:     bool,
    /// Case results in execution order.
    pub results:        Vec<TestCaseResult>,
}

impl fmt::Display for TestFileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.name, self.grade)?;
        for result in self.results.iter().filter(|r| !r.passed()) {
            writeln!(f, "  {} failed", result.name())?;
            for line in result.message().lines() {
                writeln!(f, "    {line}")?;
            }
        }
        Ok(())
    }
}
