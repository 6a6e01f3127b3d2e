#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! OK-format tests: JSON specifications with doctest-style case bodies.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{CaseKind, TestFile, TestSpec, read_source};
use crate::error::TestFileError;

/// Builds an OK-format test file from an in-memory specification.
///
/// * `spec`: `{name, value?, all_or_nothing?, cases: [...]}`
/// * `path`: provenance of the specification, used in error messages
pub fn from_value(spec: &Value, path: &str) -> Result<TestFile, TestFileError> {
    if !spec.is_object() {
        return Err(TestFileError::malformed(path, "test specification must be a JSON object"));
    }
    let spec =
        TestSpec::deserialize(spec).map_err(|e| TestFileError::malformed(path, e.to_string()))?;
    TestFile::from_spec(CaseKind::Ok, spec, path)
}

/// Reads and builds an OK-format test file stored as JSON.
pub fn from_file(path: impl AsRef<Path>) -> Result<TestFile, TestFileError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let text = read_source(path)?;
    let spec: Value =
        serde_json::from_str(&text).map_err(|e| TestFileError::malformed(&display, e.to_string()))?;
    from_value(&spec, &display)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_files::case::CaseBody;

    #[test]
    fn builds_doctest_cases() {
        let file = from_value(
            &json!({
                "name": "q1",
                "points": 3,
                "cases": [
                    {"name": "c1", "code": ">>> 1 + 1\n2"},
                    {"name": "c2", "body": ">>> x\n5", "hidden": true, "points": 2}
                ]
            }),
            "q1.json",
        )
        .expect("valid spec");

        assert_eq!(file.name(), "q1");
        assert_eq!(file.value(), 3.0);
        assert_eq!(file.weights(), &[1.0, 2.0]);
        assert!(file.test_cases()[1].hidden());
        match file.test_cases()[0].body() {
            CaseBody::Doctest { steps } => assert_eq!(steps[0].expected.as_deref(), Some("2")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn mistyped_fields_are_malformed() {
        for spec in [
            json!({"cases": [{"name": "c1", "code": ">>> 1\n1"}]}),
            json!({"name": "q1", "cases": "nope"}),
            json!({"name": "q1", "cases": [{"name": "c1", "code": ">>> 1\n1", "points": "two"}]}),
            json!(["q1"]),
        ] {
            let err = from_value(&spec, "q1.json").expect_err("malformed");
            assert!(matches!(err, TestFileError::MalformedSpec { .. }), "{err}");
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = from_file("definitely/not/here.json").expect_err("missing");
        assert!(matches!(err, TestFileError::Io { .. }));
    }
}
