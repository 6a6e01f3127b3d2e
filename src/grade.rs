#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Grading a notebook against the tests embedded in it.

use std::{fmt, path::Path, sync::Arc};

use anyhow::{Context, Result};
use futures::future::join_all;
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::TestFileError,
    evaluator::Evaluator,
    notebook::Notebook,
    test_files::{RunOptions, TestFile, TestFileSummary, metadata},
    types::Grade,
};

/// Runs every code cell of `notebook` in order and returns the resulting
/// context. A cell that raises is logged and skipped, the way a notebook
/// with an erroring cell keeps the bindings of every other cell.
pub fn build_context<E>(evaluator: &E, notebook: &Notebook) -> E::Context
where
    E: Evaluator + ?Sized,
{
    let mut context = E::Context::default();
    for (index, source) in notebook.code_sources().iter().enumerate() {
        if source.trim().is_empty() {
            continue;
        }
        if let Err(failure) = evaluator.evaluate(source, &mut context) {
            warn!(cell = index, "code cell raised: {failure}");
        }
    }
    context
}

/// Results of grading one notebook.
#[derive(Debug, Clone, Serialize)]
pub struct GradingResults {
    /// Path of the graded notebook.
    pub notebook: String,
    /// One summary per test file, in grading order.
    pub files:    Vec<TestFileSummary>,
}

impl GradingResults {
    /// Collects the summaries of already run test files.
    pub fn new(notebook: impl Into<String>, files: &[TestFile]) -> Self {
        Self {
            notebook: notebook.into(),
            files:    files.iter().map(TestFile::summary).collect(),
        }
    }

    /// Sum of all test file grades.
    pub fn total(&self) -> Grade {
        self.files.iter().map(|file| file.grade).sum()
    }
}

impl fmt::Display for GradingResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            write!(f, "{file}")?;
        }
        writeln!(f, "Total: {}", self.total())
    }
}

/// Grades the notebook at `path`.
///
/// All requested tests are loaded before anything runs, so a missing or
/// corrupted test aborts the whole run. The notebook's code cells then run
/// once, and every test file runs in order against the shared context.
///
/// * `path`: notebook to grade
/// * `evaluator`: evaluator for both the notebook and the tests
/// * `tests`: names of the tests to run, every embedded test when empty;
///   repeated names run once
/// * `options`: per-run knobs
pub fn grade_notebook<E>(
    path: impl AsRef<Path>,
    evaluator: &E,
    tests: &[String],
    options: RunOptions,
) -> Result<GradingResults, TestFileError>
where
    E: Evaluator + ?Sized,
{
    let path = path.as_ref();
    let display_path = path.display().to_string();
    let notebook = Notebook::read(path)?;

    let names = if tests.is_empty() {
        notebook.test_names(&display_path)?
    } else {
        tests.iter().unique().cloned().collect()
    };
    if names.is_empty() {
        warn!(notebook = %display_path, "notebook has no embedded tests");
    }

    let codec = metadata::ArtifactCodec::new(evaluator);
    let mut files = names
        .iter()
        .map(|name| metadata::from_notebook(&notebook, &display_path, name, &codec))
        .collect::<Result<Vec<_>, _>>()?;
    info!(notebook = %display_path, tests = %names.iter().join(", "), "loaded tests");

    let mut context = build_context(evaluator, &notebook);
    for file in &mut files {
        file.run_with(evaluator, &mut context, options);
        info!(test = file.name(), grade = file.grade(), out_of = file.value(), "graded test");
    }

    Ok(GradingResults::new(display_path, &files))
}

/// A test file paired with the context it should run against.
#[derive(Debug)]
pub struct GradingJob<C> {
    /// The test file to run.
    pub test_file: TestFile,
    /// Context the test file's cases see.
    pub context:   C,
}

impl<C> GradingJob<C> {
    /// Creates a new job.
    pub fn new(test_file: TestFile, context: C) -> Self {
        Self { test_file, context }
    }
}

/// Runs independent jobs concurrently, each on a blocking worker thread with
/// an evaluator of its own. Results come back in job order.
///
/// * `jobs`: test files with their own contexts
/// * `make_evaluator`: builds one evaluator per job
/// * `options`: per-run knobs
pub async fn run_in_parallel<E, F>(
    jobs: Vec<GradingJob<E::Context>>,
    make_evaluator: F,
    options: RunOptions,
) -> Result<Vec<TestFile>>
where
    E: Evaluator + 'static,
    E::Context: Send + 'static,
    F: Fn() -> E + Send + Sync + 'static,
{
    let make_evaluator = Arc::new(make_evaluator);

    let handles = jobs
        .into_iter()
        .map(|job| {
            let make_evaluator = Arc::clone(&make_evaluator);
            tokio::task::spawn_blocking(move || {
                let GradingJob {
                    mut test_file,
                    mut context,
                } = job;
                let evaluator = make_evaluator();
                test_file.run_with(&evaluator, &mut context, options);
                test_file
            })
        })
        .collect::<Vec<_>>();

    join_all(handles)
        .await
        .into_iter()
        .map(|result| result.context("grading worker panicked"))
        .collect()
}
