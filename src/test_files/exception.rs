#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Exception-format tests: script bodies that must raise or not raise.
//!
//! Authored sources are plain rhai with directive comments marking the
//! structure:
//!
//! ```text
//! //@ test q1 value=2 all_or_nothing
//! //@ case c1 points=1 hidden
//! assert(x == 1);
//! //@ case c2 raises=assertion failure_message="y must not be 3"
//! assert_eq(y, 3);
//! ```

use std::path::Path;

use super::{CaseKind, CaseSpec, RaisesSpec, TestFile, TestSpec, read_source};
use crate::{
    constants::DIRECTIVE_PREFIX,
    error::TestFileError,
    parsers::{Attr, AttrValue, DirectiveKind, parser},
    util::normalize_newlines,
};

/// Reads a bare flag (`hidden`) or an explicit `true`/`false`.
fn flag(attr: &Attr) -> Result<bool, String> {
    match &attr.value {
        None => Ok(true),
        Some(AttrValue::Text(text)) if text == "true" => Ok(true),
        Some(AttrValue::Text(text)) if text == "false" => Ok(false),
        Some(other) => Err(format!("`{}` expects true or false, found {other:?}", attr.key)),
    }
}

/// Reads a numeric attribute.
fn number(attr: &Attr) -> Result<f64, String> {
    match &attr.value {
        Some(AttrValue::Number(n)) => Ok(*n),
        _ => Err(format!("`{}` expects a number", attr.key)),
    }
}

/// Reads a text attribute; numbers are accepted and kept as written.
fn text(attr: &Attr) -> Result<String, String> {
    match &attr.value {
        Some(AttrValue::Text(text)) => Ok(text.clone()),
        Some(AttrValue::Number(n)) => Ok(n.to_string()),
        None => Err(format!("`{}` expects a value", attr.key)),
    }
}

/// Applies a `test` directive attribute to the spec being built.
fn apply_test_attr(spec: &mut TestSpec, attr: &Attr) -> Result<(), String> {
    match attr.key.as_str() {
        "value" | "points" => spec.value = Some(number(attr)?),
        "all_or_nothing" => spec.all_or_nothing = Some(flag(attr)?),
        other => return Err(format!("unknown test attribute `{other}`")),
    }
    Ok(())
}

/// Applies a `case` directive attribute to the case being built.
fn apply_case_attr(case: &mut CaseSpec, attr: &Attr) -> Result<(), String> {
    match attr.key.as_str() {
        "points" => case.points = Some(number(attr)?),
        "hidden" => case.hidden = Some(flag(attr)?),
        "raises" => {
            case.raises = Some(match &attr.value {
                None => RaisesSpec::Flag(true),
                Some(AttrValue::Text(text)) if text == "true" || text == "false" => {
                    RaisesSpec::Flag(text == "true")
                }
                Some(_) => RaisesSpec::Kind(text(attr)?),
            })
        }
        "success_message" => case.success_message = Some(text(attr)?),
        "failure_message" => case.failure_message = Some(text(attr)?),
        other => return Err(format!("unknown case attribute `{other}`")),
    }
    Ok(())
}

/// Moves the body lines collected so far into the current case.
fn finish_case(case: Option<CaseSpec>, body: &mut Vec<&str>, cases: &mut Vec<CaseSpec>) {
    if let Some(mut case) = case {
        let start = body.iter().position(|l| !l.trim().is_empty()).unwrap_or(body.len());
        let end = body
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map(|i| i + 1)
            .unwrap_or(start);
        case.body = body[start..end.max(start)].join("\n");
        cases.push(case);
    }
    body.clear();
}

/// Parses an authored exception-format source into a specification.
///
/// * `source`: the authored text
/// * `path`: where it came from; its file stem names the test unless a
///   `//@ test` directive does
pub fn parse_source(source: &str, path: &str) -> Result<TestSpec, TestFileError> {
    let source = normalize_newlines(source);
    let malformed =
        |line: usize, reason: String| TestFileError::malformed(path, format!("line {line}: {reason}"));

    let mut spec = TestSpec {
        name:           Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default(),
        value:          None,
        all_or_nothing: None,
        cases:          Vec::new(),
    };
    let mut saw_test_directive = false;
    let mut current: Option<CaseSpec> = None;
    let mut body = Vec::new();

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();

        if !trimmed.starts_with(DIRECTIVE_PREFIX) {
            if current.is_some() {
                body.push(line);
            } else if !trimmed.is_empty() && !trimmed.starts_with("//") {
                return Err(malformed(line_no, "code outside of a test case".into()));
            }
            continue;
        }

        let directive = parser::directive(trimmed).map_err(|e| {
            malformed(line_no, format!("invalid directive, expected {}", e.expected))
        })?;

        match directive.kind {
            DirectiveKind::Test => {
                if saw_test_directive {
                    return Err(malformed(line_no, "more than one `test` directive".into()));
                }
                if current.is_some() || !spec.cases.is_empty() {
                    return Err(malformed(
                        line_no,
                        "the `test` directive must come before the first case".into(),
                    ));
                }
                saw_test_directive = true;
                spec.name = directive.name;
                for attr in &directive.attrs {
                    apply_test_attr(&mut spec, attr).map_err(|e| malformed(line_no, e))?;
                }
            }
            DirectiveKind::Case => {
                finish_case(current.take(), &mut body, &mut spec.cases);
                let mut case = CaseSpec {
                    name:            directive.name,
                    body:            String::new(),
                    points:          None,
                    hidden:          None,
                    raises:          None,
                    success_message: None,
                    failure_message: None,
                };
                for attr in &directive.attrs {
                    apply_case_attr(&mut case, attr).map_err(|e| malformed(line_no, e))?;
                }
                current = Some(case);
            }
        }
    }
    finish_case(current, &mut body, &mut spec.cases);

    Ok(spec)
}

/// Builds an exception-format test file from an authored source.
pub fn from_source(source: &str, path: &str) -> Result<TestFile, TestFileError> {
    let spec = parse_source(source, path)?;
    TestFile::from_spec(CaseKind::Exception, spec, path)
}

/// Reads and builds an exception-format test file.
pub fn from_file(path: impl AsRef<Path>) -> Result<TestFile, TestFileError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    from_source(&source, &path.display().to_string())
}
