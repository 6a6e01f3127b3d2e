//! # otter_grade
//!
//! Test specifications and grading for notebook assignments. Test files are
//! loaded from OK-format JSON, exception-format sources, or artifacts embedded
//! in a notebook's metadata, and run against the bindings the notebook's code
//! cells produce.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Process-wide configuration read from the environment
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Errors raised while building test files
pub mod error;
/// The pluggable engine that runs test logic
pub mod evaluator;
/// PDF export of notebooks
pub mod export;
/// For all things related to grading
pub mod grade;
/// Notebook document model
pub mod notebook;
/// For all parsers used
pub mod parsers;
/// Running external tools
pub mod process;
/// Test files, test cases and their storage formats
pub mod test_files;
/// Small value types shared across modules
pub mod types;
/// Utility functions for convenience
pub mod util;

pub use error::{CompileError, DecodeError, TestFileError};
pub use evaluator::{EvalFailure, Evaluation, Evaluator, ExecutionContext, RhaiEvaluator};
pub use grade::{GradingJob, GradingResults, build_context, grade_notebook, run_in_parallel};
pub use notebook::Notebook;
pub use test_files::{
    CaseKind, RunOptions, TestFile, TestSpec,
    case::{TestCase, TestCaseResult},
    metadata::ArtifactCodec,
};
pub use types::Grade;
