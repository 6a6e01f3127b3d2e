use std::{fs, path::PathBuf};

use otter_grade::{
    ArtifactCodec, DecodeError, ExecutionContext, Notebook, RhaiEvaluator, TestFile, TestFileError,
    test_files::{CaseKind, exception, metadata},
};
use serde_json::json;
use uuid::Uuid;

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn notebook_fixture(name: &str) -> PathBuf {
    fixtures_root().join("notebooks").join(name)
}

fn temp_copy(name: &str) -> (PathBuf, PathBuf) {
    let root = std::env::temp_dir().join(format!("otter-metadata-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    let path = root.join(name);
    fs::copy(notebook_fixture(name), &path).expect("copy notebook fixture");
    (root, path)
}

fn context() -> ExecutionContext {
    ExecutionContext::new().with("total", 6_i64)
}

#[test]
fn decoding_preserves_behavior() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let source = fs::read_to_string(fixtures_root().join("tests/q2.rhai")).expect("fixture");

    let mut direct = exception::from_source(&source, "q2.rhai").expect("direct");
    let encoded = codec.encode(&source, "q2.rhai").expect("encodes");
    let mut decoded =
        TestFile::from_spec(CaseKind::Exception, codec.decode(&encoded).expect("decodes"), "q2.rhai")
            .expect("valid");

    for total in [6_i64, -1] {
        direct.run(&evaluator, &mut ExecutionContext::new().with("total", total));
        decoded.run(&evaluator, &mut ExecutionContext::new().with("total", total));
        assert_eq!(direct.test_case_results(), decoded.test_case_results());
        assert_eq!(direct.grade(), decoded.grade());
    }
}

#[test]
fn encoded_no_error_check_fails_when_the_operation_errors() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let encoded = codec
        .encode("//@ case divides\nlet ratio = total / divisor;\n", "q9.rhai")
        .expect("encodes");
    let spec = codec.decode(&encoded).expect("decodes");
    let mut file = TestFile::from_spec(CaseKind::Exception, spec, "q9.rhai").expect("valid");

    file.run(&evaluator, &mut context().with("divisor", 0_i64));

    let result = &file.test_case_results()[0];
    assert!(!result.passed());
    assert!(!result.message().is_empty());
    assert!(result.message().contains("arithmetic"), "{}", result.message());
}

#[test]
fn embedded_tests_load_by_kind() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let path = notebook_fixture("hw01.ipynb");

    let q1 = metadata::ok_from_file(&path, "q1").expect("ok test");
    assert_eq!(q1.kind(), CaseKind::Ok);
    assert_eq!(q1.value(), 2.0);

    let mut q2 = metadata::exception_from_file(&path, "q2", &codec).expect("exception test");
    assert_eq!(q2.kind(), CaseKind::Exception);
    q2.run(&evaluator, &mut context());
    assert_eq!(q2.grade(), 3.0);

    let q2_again = metadata::from_file(&path, "q2", &codec).expect("dispatch");
    assert_eq!(q2_again.kind(), CaseKind::Exception);
}

#[test]
fn missing_test_is_distinguished_from_a_corrupted_one() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let mut notebook = Notebook::read(notebook_fixture("hw01.ipynb")).expect("fixture");
    notebook
        .insert_test("q3", json!("b3RoZXItc3R1ZmY="))
        .expect("insert");

    let missing = metadata::from_notebook(&notebook, "hw01.ipynb", "q404", &codec)
        .expect_err("absent test");
    assert!(matches!(missing, TestFileError::TestNotFound { ref test_name, .. } if test_name == "q404"));

    let corrupted = metadata::from_notebook(&notebook, "hw01.ipynb", "q3", &codec)
        .expect_err("corrupted test");
    assert!(matches!(corrupted, TestFileError::Decode(DecodeError::InvalidPayload(_))), "{corrupted}");
}

#[test]
fn mistyped_embedded_entries_are_malformed() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let mut notebook = Notebook::read(notebook_fixture("hw01.ipynb")).expect("fixture");
    notebook.insert_test("q5", json!(42)).expect("insert");

    let err = metadata::ok_from_notebook(&notebook, "hw01.ipynb", "q5").expect_err("not an object");
    assert!(matches!(err, TestFileError::MalformedSpec { .. }), "{err}");

    let err = metadata::exception_from_notebook(&notebook, "hw01.ipynb", "q1", &codec)
        .expect_err("object is not an artifact");
    assert!(matches!(err, TestFileError::MalformedSpec { .. }), "{err}");
}

#[test]
fn embed_file_round_trips_through_the_notebook() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);
    let (root, path) = temp_copy("untested.ipynb");

    let name = metadata::embed_file(&path, fixtures_root().join("tests/q2.rhai"), &codec)
        .expect("embed exception test");
    assert_eq!(name, "q2");
    let name = metadata::embed_file(&path, fixtures_root().join("tests/q1.json"), &codec)
        .expect("embed ok test");
    assert_eq!(name, "q1");

    let notebook = Notebook::read(&path).expect("written notebook");
    assert_eq!(notebook.test_names("untested.ipynb").expect("names"), vec!["q1", "q2"]);
    assert!(notebook.test_artifact("untested.ipynb", "q1").expect("q1").is_object());
    assert!(notebook.test_artifact("untested.ipynb", "q2").expect("q2").is_string());
    assert_eq!(notebook.code_sources().len(), 1);

    let _ = fs::remove_dir_all(root);
}
