use std::path::PathBuf;

use otter_grade::{
    ExecutionContext, GradingJob, Notebook, RhaiEvaluator, RunOptions, TestFileError,
    build_context, grade_notebook, run_in_parallel,
    test_files::{exception, ok},
};

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn notebook_fixture(name: &str) -> PathBuf {
    fixtures_root().join("notebooks").join(name)
}

#[test]
fn context_comes_from_the_code_cells() {
    let evaluator = RhaiEvaluator::new();
    let notebook = Notebook::read(notebook_fixture("hw01.ipynb")).expect("fixture");

    let ctx = build_context(&evaluator, &notebook);

    assert_eq!(ctx.get("total").and_then(|v| v.as_int().ok()), Some(6));
}

#[test]
fn correct_notebook_earns_full_marks() {
    let evaluator = RhaiEvaluator::new();
    let results = grade_notebook(notebook_fixture("hw01.ipynb"), &evaluator, &[], RunOptions::default())
        .expect("grades");

    let names = results.files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["q1", "q2"]);
    assert_eq!(results.total().grade, 5.0);
    assert_eq!(results.total().out_of, 5.0);
    assert!(results.to_string().ends_with("Total: 5.00/5.00\n"), "{results}");
}

#[test]
fn wrong_answers_lose_points_and_hidden_detail_stays_hidden() {
    let evaluator = RhaiEvaluator::new();
    let results = grade_notebook(
        notebook_fixture("hw01_wrong.ipynb"),
        &evaluator,
        &[],
        RunOptions::default(),
    )
    .expect("grades");

    let q1 = &results.files[0];
    assert_eq!(q1.grade.grade, 0.0);
    assert!(!q1.passed_all);
    assert_eq!(q1.results[1].message(), otter_grade::constants::HIDDEN_FAILURE_MESSAGE);
    assert_eq!(results.total().grade, 3.0);

    let json = serde_json::to_value(&results).expect("serializable");
    assert_eq!(json["files"][0]["results"][0]["passed"], serde_json::json!(false));
}

#[test]
fn selected_tests_only() {
    let evaluator = RhaiEvaluator::new();
    let results = grade_notebook(
        notebook_fixture("hw01.ipynb"),
        &evaluator,
        &["q2".to_string()],
        RunOptions::default(),
    )
    .expect("grades");

    assert_eq!(results.files.len(), 1);
    assert_eq!(results.total().out_of, 3.0);
}

#[test]
fn repeated_test_names_run_once() {
    let evaluator = RhaiEvaluator::new();
    let results = grade_notebook(
        notebook_fixture("hw01.ipynb"),
        &evaluator,
        &["q2".to_string(), "q1".to_string(), "q2".to_string()],
        RunOptions::default(),
    )
    .expect("grades");

    let names = results.files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["q2", "q1"]);
    assert_eq!(results.total().out_of, 5.0);
}

#[test]
fn unknown_test_aborts_before_anything_runs() {
    let evaluator = RhaiEvaluator::new();
    let err = grade_notebook(
        notebook_fixture("hw01.ipynb"),
        &evaluator,
        &["q1".to_string(), "q404".to_string()],
        RunOptions::default(),
    )
    .expect_err("missing test");

    assert!(matches!(err, TestFileError::TestNotFound { .. }), "{err}");
}

#[test]
fn notebook_without_tests_grades_to_nothing() {
    let evaluator = RhaiEvaluator::new();
    let results = grade_notebook(
        notebook_fixture("untested.ipynb"),
        &evaluator,
        &[],
        RunOptions::default(),
    )
    .expect("grades");

    assert!(results.files.is_empty());
    assert_eq!(results.total().out_of, 0.0);
}

#[tokio::test]
async fn parallel_jobs_keep_their_order_and_contexts() {
    let q1 = ok::from_file(fixtures_root().join("tests/q1.json")).expect("q1");
    let q2 = exception::from_file(fixtures_root().join("tests/q2.rhai")).expect("q2");

    let jobs = vec![
        GradingJob::new(q1.clone(), ExecutionContext::new().with("total", 6_i64)),
        GradingJob::new(q2.clone(), ExecutionContext::new().with("total", 6_i64)),
        GradingJob::new(q2, ExecutionContext::new()),
    ];

    let files = run_in_parallel(jobs, RhaiEvaluator::new, RunOptions::default())
        .await
        .expect("workers finish");

    let names = files.iter().map(|f| f.name()).collect::<Vec<_>>();
    assert_eq!(names, vec!["q1", "q2", "q2"]);
    // no `square` in the first context, so only the visible case passes
    assert_eq!(files[0].grade(), 1.0);
    assert_eq!(files[1].grade(), 3.0);
    assert_eq!(files[2].grade(), 0.5);
}
