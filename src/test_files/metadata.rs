#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Tests embedded in a notebook's metadata under `otter.tests.<name>`.
//!
//! OK-format tests are stored as plain JSON objects. Exception-format tests
//! are stored as an opaque artifact string produced by [`ArtifactCodec`]:
//! base64 over a small versioned JSON envelope holding the test
//! specification. Bodies are checked with the evaluator when an artifact is
//! written and again when it is read back.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{CaseKind, TestFile, TestSpec, exception, ok, read_source};
use crate::{
    constants::{ARTIFACT_FORMAT, ARTIFACT_VERSION},
    error::{CompileError, DecodeError, TestFileError},
    evaluator::Evaluator,
    notebook::Notebook,
};

/// Fields every artifact starts with, checked before the rest is looked at.
#[derive(Deserialize)]
struct ArtifactHeader {
    /// Always [`ARTIFACT_FORMAT`].
    format:    String,
    /// Layout version, [`ARTIFACT_VERSION`] for artifacts written by this
    /// build.
    version:   u32,
    /// Name of the evaluator the bodies were checked with.
    evaluator: String,
}

/// The full artifact envelope.
#[derive(Serialize, Deserialize)]
struct Artifact {
    /// See [`ArtifactHeader::format`].
    format:    String,
    /// See [`ArtifactHeader::version`].
    version:   u32,
    /// See [`ArtifactHeader::evaluator`].
    evaluator: String,
    /// The test itself.
    spec:      TestSpec,
}

/// Encodes exception-format tests into artifact strings and decodes them
/// back, checking the bodies with `evaluator` both ways.
pub struct ArtifactCodec<'e, E: Evaluator + ?Sized> {
    /// Evaluator the bodies must be valid for.
    evaluator: &'e E,
}

impl<'e, E: Evaluator + ?Sized> ArtifactCodec<'e, E> {
    /// Creates a codec bound to `evaluator`.
    pub fn new(evaluator: &'e E) -> Self {
        Self { evaluator }
    }

    /// Compiles every case body of `spec`.
    fn compile(&self, spec: &TestSpec, origin: &str) -> Result<(), CompileError> {
        for case in &spec.cases {
            self.evaluator
                .compile(&case.body, &format!("{origin}::{}", case.name))?;
        }
        Ok(())
    }

    /// Encodes an authored exception-format source.
    ///
    /// * `source`: the authored text
    /// * `path`: where it came from, names the test when the source has no
    ///   `test` directive
    ///
    /// Fails with [`TestFileError::MalformedSpec`] when the structure is
    /// invalid and with [`TestFileError::Compile`] when a body does not
    /// compile.
    pub fn encode(&self, source: &str, path: &str) -> Result<String, TestFileError> {
        let spec = exception::parse_source(source, path)?;
        self.encode_spec(&spec, path)
    }

    /// Encodes an already parsed exception-format specification.
    pub fn encode_spec(&self, spec: &TestSpec, path: &str) -> Result<String, TestFileError> {
        TestFile::from_spec(CaseKind::Exception, spec.clone(), path)?;
        self.compile(spec, path)?;

        let artifact = Artifact {
            format:    ARTIFACT_FORMAT.to_string(),
            version:   ARTIFACT_VERSION,
            evaluator: self.evaluator.name().to_string(),
            spec:      spec.clone(),
        };
        let bytes = serde_json::to_vec(&artifact)
            .map_err(|e| CompileError::new(path, format!("cannot serialize artifact: {e}")))?;

        debug!(test = %spec.name, bytes = bytes.len(), "encoded test artifact");
        Ok(STANDARD.encode(bytes))
    }

    /// Reads and encodes an authored exception-format source file.
    pub fn encode_file(&self, path: impl AsRef<Path>) -> Result<String, TestFileError> {
        let path = path.as_ref();
        let source = read_source(path)?;
        self.encode(&source, &path.display().to_string())
    }

    /// Decodes an artifact string back into its specification.
    pub fn decode(&self, encoded: &str) -> Result<TestSpec, DecodeError> {
        let bytes = STANDARD.decode(encoded.trim())?;

        let header: ArtifactHeader = serde_json::from_slice(&bytes)?;
        if header.format != ARTIFACT_FORMAT {
            return Err(DecodeError::UnrecognizedFormat(header.format));
        }
        if header.version != ARTIFACT_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found:     header.version,
                supported: ARTIFACT_VERSION,
            });
        }
        if header.evaluator != self.evaluator.name() {
            return Err(DecodeError::EvaluatorMismatch {
                expected: self.evaluator.name().to_string(),
                found:    header.evaluator,
            });
        }

        let artifact: Artifact = serde_json::from_slice(&bytes)?;
        self.compile(&artifact.spec, &artifact.spec.name)
            .map_err(DecodeError::InvalidBody)?;
        Ok(artifact.spec)
    }
}

/// Builds an OK-format test from an already loaded notebook.
pub fn ok_from_notebook(
    notebook: &Notebook,
    path: &str,
    test_name: &str,
) -> Result<TestFile, TestFileError> {
    let artifact = notebook.test_artifact(path, test_name)?;
    if !artifact.is_object() {
        return Err(TestFileError::malformed(
            path,
            format!("embedded OK-format test `{test_name}` must be an object"),
        ));
    }
    ok::from_value(artifact, path)
}

/// Builds an exception-format test from an already loaded notebook.
pub fn exception_from_notebook<E: Evaluator + ?Sized>(
    notebook: &Notebook,
    path: &str,
    test_name: &str,
    codec: &ArtifactCodec<'_, E>,
) -> Result<TestFile, TestFileError> {
    let Value::String(encoded) = notebook.test_artifact(path, test_name)? else {
        return Err(TestFileError::malformed(
            path,
            format!("embedded exception-format test `{test_name}` must be an artifact string"),
        ));
    };
    let spec = codec.decode(encoded)?;
    TestFile::from_spec(CaseKind::Exception, spec, path)
}

/// Builds whichever kind of test is stored under `test_name`: objects are
/// OK-format specifications, strings are exception-format artifacts.
pub fn from_notebook<E: Evaluator + ?Sized>(
    notebook: &Notebook,
    path: &str,
    test_name: &str,
    codec: &ArtifactCodec<'_, E>,
) -> Result<TestFile, TestFileError> {
    let file = match notebook.test_artifact(path, test_name)? {
        Value::String(_) => exception_from_notebook(notebook, path, test_name, codec)?,
        _ => ok_from_notebook(notebook, path, test_name)?,
    };
    debug!(test = test_name, kind = %file.kind(), cases = file.test_cases().len(), "loaded embedded test");
    Ok(file)
}

/// Reads a notebook and builds the OK-format test named `test_name` from its
/// metadata.
pub fn ok_from_file(path: impl AsRef<Path>, test_name: &str) -> Result<TestFile, TestFileError> {
    let path = path.as_ref();
    ok_from_notebook(&Notebook::read(path)?, &path.display().to_string(), test_name)
}

/// Reads a notebook and builds the exception-format test named `test_name`
/// from its metadata.
pub fn exception_from_file<E: Evaluator + ?Sized>(
    path: impl AsRef<Path>,
    test_name: &str,
    codec: &ArtifactCodec<'_, E>,
) -> Result<TestFile, TestFileError> {
    let path = path.as_ref();
    exception_from_notebook(&Notebook::read(path)?, &path.display().to_string(), test_name, codec)
}

/// Reads a notebook and builds whichever kind of test is stored under
/// `test_name`.
pub fn from_file<E: Evaluator + ?Sized>(
    path: impl AsRef<Path>,
    test_name: &str,
    codec: &ArtifactCodec<'_, E>,
) -> Result<TestFile, TestFileError> {
    let path = path.as_ref();
    from_notebook(&Notebook::read(path)?, &path.display().to_string(), test_name, codec)
}

/// Stores the test at `test_path` in the metadata of the notebook at
/// `notebook_path` and returns the test's name.
///
/// `.json` files are OK-format specifications and are embedded as objects;
/// anything else is an exception-format source and is embedded as an
/// artifact string.
pub fn embed_file<E: Evaluator + ?Sized>(
    notebook_path: impl AsRef<Path>,
    test_path: impl AsRef<Path>,
    codec: &ArtifactCodec<'_, E>,
) -> Result<String, TestFileError> {
    let (notebook_path, test_path) = (notebook_path.as_ref(), test_path.as_ref());
    let display = test_path.display().to_string();
    let mut notebook = Notebook::read(notebook_path)?;

    let is_json = test_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let (name, artifact) = if is_json {
        let text = read_source(test_path)?;
        let spec: Value = serde_json::from_str(&text)
            .map_err(|e| TestFileError::malformed(&display, e.to_string()))?;
        let file = ok::from_value(&spec, &display)?;
        (file.name().to_string(), spec)
    } else {
        let spec = exception::parse_source(&read_source(test_path)?, &display)?;
        let encoded = codec.encode_spec(&spec, &display)?;
        (spec.name, Value::String(encoded))
    };

    notebook.insert_test(&name, artifact)?;
    notebook.write(notebook_path)?;
    debug!(test = %name, notebook = %notebook_path.display(), "embedded test");
    Ok(name)
}
