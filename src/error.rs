#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Errors raised while building test files. Anything that happens while a
//! test case's body is being evaluated is an [`EvalFailure`] instead, and
//! ends up inside a test case result.
//!
//! [`EvalFailure`]: crate::evaluator::EvalFailure

/// Errors that prevent a test file from being constructed.
#[derive(thiserror::Error, Debug)]
pub enum TestFileError {
    /// The specification is missing required fields, has mistyped fields, or
    /// violates a structural rule (no cases, duplicate names, ...).
    #[error("Malformed test specification in `{path}`: {reason}")]
    MalformedSpec {
        /// Where the specification came from.
        path:   String,
        /// What was wrong with it.
        reason: String,
    },
    /// The requested test is not present in the notebook's metadata.
    #[error("Test `{test_name}` was not found in the metadata of `{path}`")]
    TestNotFound {
        /// Path of the notebook that was searched.
        path:      String,
        /// Name of the test that was requested.
        test_name: String,
    },
    /// Test logic could not be compiled.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// An embedded test artifact could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The specification could not be read from storage.
    #[error("Could not read `{path}`")]
    Io {
        /// Path that could not be read or written.
        path:   String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TestFileError {
    /// Shorthand for building a [`TestFileError::MalformedSpec`].
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            path:   path.into(),
            reason: reason.into(),
        }
    }
}

/// Test logic that is not valid for the evaluator that has to run it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not compile `{origin}`: {message}")]
pub struct CompileError {
    /// Where the offending source came from, eg. `q1.rhai::c2`.
    pub origin:  String,
    /// Diagnostic produced by the parser or compiler.
    pub message: String,
}

impl CompileError {
    /// Creates a new compile error.
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin:  origin.into(),
            message: message.into(),
        }
    }
}

/// Reasons an embedded test artifact could not be turned back into a test.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The artifact is not valid base64.
    #[error("Test artifact is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The decoded bytes are not a well-formed artifact payload.
    #[error("Test artifact payload is corrupted or truncated: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    /// The payload is well-formed but is not an otter test artifact.
    #[error("Unrecognized test artifact format `{0}`")]
    UnrecognizedFormat(String),
    /// The payload was written by an unknown version of the artifact layout.
    #[error("Unsupported test artifact version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the payload.
        found:     u32,
        /// Version this build reads and writes.
        supported: u32,
    },
    /// The payload targets a different evaluator.
    #[error("Test artifact was compiled for evaluator `{found}`, not `{expected}`")]
    EvaluatorMismatch {
        /// Evaluator doing the decoding.
        expected: String,
        /// Evaluator recorded in the payload.
        found:    String,
    },
    /// A body inside the payload no longer compiles.
    #[error("Test artifact contains a body that does not compile: {0}")]
    InvalidBody(CompileError),
}
