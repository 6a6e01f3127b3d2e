use std::path::PathBuf;

use otter_grade::{
    ArtifactCodec, ExecutionContext, RhaiEvaluator, TestFileError,
    test_files::{CaseKind, exception},
};

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

#[test]
fn fixture_source_runs_against_the_context() {
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_file(fixtures_root().join("tests/q2.rhai")).expect("fixture");

    assert_eq!(file.name(), "q2");
    assert_eq!(file.kind(), CaseKind::Exception);
    assert_eq!(file.weights(), &[0.5, 2.0, 0.5]);

    file.run(&evaluator, &mut ExecutionContext::new().with("total", 6_i64));

    assert!(file.passed_all(), "{:?}", file.test_case_results());
    assert_eq!(file.grade(), 3.0);
}

#[test]
fn raising_when_no_error_is_expected_fails_with_a_diagnostic() {
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_file(fixtures_root().join("tests/q2.rhai")).expect("fixture");

    // `total` is unbound, so the first two cases raise
    file.run(&evaluator, &mut ExecutionContext::new());

    let results = file.test_case_results();
    assert!(!results[0].passed());
    assert!(results[0].message().contains("name error"), "{}", results[0].message());
    assert!(!results[1].passed());
    assert!(results[2].passed());
    assert_eq!(file.grade(), 0.5);
}

#[test]
fn wrong_error_kind_fails_with_author_message() {
    let source = "//@ case c1 raises=index failure_message=\"should index out of range\"\nthrow \"boom\";";
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_source(source, "q5.rhai").expect("valid source");

    file.run(&evaluator, &mut ExecutionContext::new());

    let result = &file.test_case_results()[0];
    assert!(!result.passed());
    assert!(result.message().starts_with("should index out of range\n\n"), "{}", result.message());
    assert!(result.message().contains("got: runtime error: boom"), "{}", result.message());
}

#[test]
fn expected_error_that_never_comes_fails() {
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_source("//@ case c1 raises\nlet fine = 1;", "q6.rhai").expect("valid");

    file.run(&evaluator, &mut ExecutionContext::new());

    assert!(!file.passed_all());
    assert_eq!(
        file.test_case_results()[0].message(),
        "Expected an error to be raised, but none was"
    );
}

#[test]
fn side_effects_carry_over_between_cases() {
    let source = "//@ case setup\nlet seen = 41;\n//@ case check\nassert_eq(seen + 1, 42);";
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_source(source, "q7.rhai").expect("valid");

    file.run(&evaluator, &mut ExecutionContext::new());

    assert!(file.passed_all(), "{:?}", file.test_case_results());
}

#[test]
fn success_messages_and_verbose_runs() {
    let source = "//@ case c1 success_message=\"well done\"\nassert(true);\n//@ case c2\nassert(true);";
    let evaluator = RhaiEvaluator::new();
    let mut file = exception::from_source(source, "q8.rhai").expect("valid");

    file.run(&evaluator, &mut ExecutionContext::new());
    let messages = file
        .test_case_results()
        .iter()
        .map(|r| r.message().to_string())
        .collect::<Vec<_>>();
    assert_eq!(messages, vec![String::new(), String::new()]);

    file.run_with(&evaluator, &mut ExecutionContext::new(), otter_grade::RunOptions {
        verbose: true,
    });
    assert_eq!(file.test_case_results()[0].message(), "well done");
    assert_eq!(file.test_case_results()[1].message(), "c2 passed");
}

#[test]
fn encode_reports_syntax_errors_as_compile_errors() {
    let evaluator = RhaiEvaluator::new();
    let codec = ArtifactCodec::new(&evaluator);

    let err = codec
        .encode("//@ case c1\nassert(1 == ;\n", "broken.rhai")
        .expect_err("syntax error");
    assert!(matches!(err, TestFileError::Compile(_)), "{err}");

    let err = codec
        .encode("assert(true);\n", "stray.rhai")
        .expect_err("no case directive");
    assert!(matches!(err, TestFileError::MalformedSpec { .. }), "{err}");
}
