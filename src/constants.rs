#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Key under a notebook's top-level `metadata` that holds everything otter
/// stores in the notebook.
pub const NOTEBOOK_METADATA_KEY: &str = "otter";

/// Key under `metadata.otter` that maps test names to their specifications.
pub const TESTS_KEY: &str = "tests";

/// Format tag written into every serialized test artifact.
pub const ARTIFACT_FORMAT: &str = "otter-test-artifact";

/// Current version of the serialized test artifact layout.
/// * `1`: JSON envelope carrying the test spec with script bodies as source.
pub const ARTIFACT_VERSION: u32 = 1;

/// Point value of a test file that does not declare one.
pub const DEFAULT_TEST_VALUE: f64 = 1.0;

/// Message reported for a failed hidden test case without its own
/// `failure_message`.
pub const HIDDEN_FAILURE_MESSAGE: &str = "A hidden test case failed.";

/// Prefix of directive comments in exception-format test sources.
pub const DIRECTIVE_PREFIX: &str = "//@";

/// Name of the default LaTeX template used for PDF export.
pub const LATEX_TEMPLATE: &str = "via_latex";

/// Name of the LaTeX template with xeCJK enabled, used as a fallback when the
/// default template fails to render.
pub const LATEX_XECJK_TEMPLATE: &str = "via_latex_xecjk";
