#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Just enough of the notebook document model to find code cells and the
//! test artifacts stored in the notebook's metadata. Fields this crate does
//! not care about are carried through untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    constants::{NOTEBOOK_METADATA_KEY, TESTS_KEY},
    error::TestFileError,
};

/// Cell source: a single string or a list of lines that already carry their
/// newlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    /// Source split into lines.
    Lines(Vec<String>),
    /// Source as one string.
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    /// The source as a single string.
    pub fn text(&self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Text(text) => text.clone(),
        }
    }
}

/// A notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// `code`, `markdown` or `raw`.
    pub cell_type: String,
    /// Cell contents.
    #[serde(default)]
    pub source:    CellSource,
    /// Everything else (outputs, ids, per-cell metadata).
    #[serde(flatten)]
    pub extra:     Map<String, Value>,
}

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Cells in document order.
    #[serde(default)]
    pub cells:    Vec<Cell>,
    /// Notebook level metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Everything else (`nbformat`, `nbformat_minor`, ...).
    #[serde(flatten)]
    pub extra:    Map<String, Value>,
}

impl Notebook {
    /// Parses a notebook document.
    ///
    /// * `text`: notebook JSON
    /// * `path`: where it came from, for error messages
    pub fn parse(text: &str, path: &str) -> Result<Self, TestFileError> {
        serde_json::from_str(text)
            .map_err(|e| TestFileError::malformed(path, format!("not a valid notebook: {e}")))
    }

    /// Reads a notebook from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, TestFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TestFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Writes the notebook back to disk.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), TestFileError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(|e| {
            TestFileError::malformed(path.display().to_string(), format!("cannot serialize: {e}"))
        })?;
        std::fs::write(path, text + "\n").map_err(|source| TestFileError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Sources of all code cells, in document order.
    pub fn code_sources(&self) -> Vec<String> {
        self.cells
            .iter()
            .filter(|cell| cell.cell_type == "code")
            .map(|cell| cell.source.text())
            .collect()
    }

    /// The `otter.tests` map of the metadata, `None` when either level is
    /// missing.
    ///
    /// * `path`: where the notebook came from, for error messages
    pub fn tests(&self, path: &str) -> Result<Option<&Map<String, Value>>, TestFileError> {
        let Some(otter) = self.metadata.get(NOTEBOOK_METADATA_KEY) else {
            return Ok(None);
        };
        let otter = otter.as_object().ok_or_else(|| {
            TestFileError::malformed(path, format!("metadata `{NOTEBOOK_METADATA_KEY}` is not an object"))
        })?;
        match otter.get(TESTS_KEY) {
            None => Ok(None),
            Some(Value::Object(tests)) => Ok(Some(tests)),
            Some(_) => Err(TestFileError::malformed(
                path,
                format!("metadata `{NOTEBOOK_METADATA_KEY}.{TESTS_KEY}` is not an object"),
            )),
        }
    }

    /// The artifact stored for `test_name`.
    pub fn test_artifact(&self, path: &str, test_name: &str) -> Result<&Value, TestFileError> {
        self.tests(path)?
            .and_then(|tests| tests.get(test_name))
            .ok_or_else(|| TestFileError::TestNotFound {
                path:      path.to_string(),
                test_name: test_name.to_string(),
            })
    }

    /// Names of all embedded tests, sorted.
    pub fn test_names(&self, path: &str) -> Result<Vec<String>, TestFileError> {
        let mut names = self
            .tests(path)?
            .map(|tests| tests.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    /// Stores `artifact` under `otter.tests.<name>`, creating the maps as
    /// needed and replacing any previous artifact of the same name.
    pub fn insert_test(&mut self, name: &str, artifact: Value) -> Result<(), TestFileError> {
        let otter = self
            .metadata
            .entry(NOTEBOOK_METADATA_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(otter) = otter else {
            return Err(TestFileError::malformed(
                "<notebook>",
                format!("metadata `{NOTEBOOK_METADATA_KEY}` is not an object"),
            ));
        };
        let tests = otter
            .entry(TESTS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(tests) = tests else {
            return Err(TestFileError::malformed(
                "<notebook>",
                format!("metadata `{NOTEBOOK_METADATA_KEY}.{TESTS_KEY}` is not an object"),
            ));
        };
        tests.insert(name.to_string(), artifact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notebook(metadata: Value) -> Notebook {
        serde_json::from_value(json!({
            "cells": [
                {"cell_type": "markdown", "source": "# Homework", "metadata": {}},
                {"cell_type": "code", "source": ["let x = 1;\n", "let y = 2;"], "outputs": []},
                {"cell_type": "code", "source": "x + y", "outputs": []}
            ],
            "metadata": metadata,
            "nbformat": 4,
            "nbformat_minor": 5
        }))
        .expect("valid notebook")
    }

    #[test]
    fn collects_code_sources() {
        let nb = notebook(json!({}));
        assert_eq!(nb.code_sources(), vec!["let x = 1;\nlet y = 2;", "x + y"]);
        assert_eq!(nb.extra.get("nbformat"), Some(&json!(4)));
    }

    #[test]
    fn missing_metadata_levels_mean_test_not_found() {
        for metadata in [json!({}), json!({"otter": {}}), json!({"otter": {"tests": {}}})] {
            let err = notebook(metadata).test_artifact("hw.ipynb", "q1").expect_err("absent");
            assert!(matches!(err, TestFileError::TestNotFound { .. }), "{err}");
        }
    }

    #[test]
    fn mistyped_metadata_is_malformed() {
        let err = notebook(json!({"otter": {"tests": []}}))
            .test_artifact("hw.ipynb", "q1")
            .expect_err("not a map");
        assert!(matches!(err, TestFileError::MalformedSpec { .. }));
    }

    #[test]
    fn insert_test_creates_metadata_maps() {
        let mut nb = notebook(json!({"kernelspec": {"name": "rhai"}}));
        nb.insert_test("q2", json!("abc")).expect("insert");
        nb.insert_test("q1", json!({"name": "q1"})).expect("insert");

        assert_eq!(nb.test_names("hw.ipynb").expect("names"), vec!["q1", "q2"]);
        assert_eq!(nb.test_artifact("hw.ipynb", "q2").expect("present"), &json!("abc"));
        assert!(nb.metadata.contains_key("kernelspec"));
    }
}
