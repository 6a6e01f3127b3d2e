use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use otter_grade::export::{
    ConversionError, ExportOptions, ExporterKind, PdfExporter, default_destination, export_notebook,
};

/// Records every conversion and fails LaTeX runs that do not use xeCJK.
#[derive(Default)]
struct FlakyLatex {
    calls:       Mutex<Vec<(PathBuf, Option<String>)>>,
    always_fail: bool,
    no_cjk:      bool,
}

impl PdfExporter for FlakyLatex {
    async fn convert(
        &self,
        notebook: &Path,
        dest: &Path,
        options: &ExportOptions,
    ) -> Result<(), ConversionError> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push((dest.to_path_buf(), options.template_name().map(str::to_string)));

        if options.exporter == ExporterKind::Latex && (self.always_fail || !options.xecjk) {
            return Err(ConversionError::LatexFailed {
                notebook: notebook.display().to_string(),
                log:      "! Package fontspec Error".to_string(),
            });
        }
        Ok(())
    }

    fn supports_xecjk(&self) -> bool {
        !self.no_cjk
    }
}

#[tokio::test]
async fn latex_failure_retries_once_with_xecjk() {
    let exporter = FlakyLatex::default();
    let options = ExportOptions::builder().build();

    let pdf = export_notebook(&exporter, Path::new("hw/hw01.ipynb"), None, &options)
        .await
        .expect("second attempt succeeds");

    assert_eq!(pdf, PathBuf::from("hw/hw01.pdf"));
    let calls = exporter.calls.lock().expect("calls poisoned");
    let templates = calls.iter().map(|(_, t)| t.as_deref()).collect::<Vec<_>>();
    assert_eq!(templates, vec![Some("via_latex"), Some("via_latex_xecjk")]);
}

#[tokio::test]
async fn no_xecjk_disables_the_retry() {
    let exporter = FlakyLatex::default();
    let options = ExportOptions::builder().no_xecjk(true).build();

    let err = export_notebook(&exporter, Path::new("hw01.ipynb"), None, &options)
        .await
        .expect_err("no retry");

    assert!(matches!(err, ConversionError::LatexFailed { .. }));
    assert_eq!(exporter.calls.lock().expect("calls poisoned").len(), 1);
}

#[tokio::test]
async fn retry_happens_only_once() {
    let exporter = FlakyLatex {
        always_fail: true,
        ..Default::default()
    };

    let err = export_notebook(&exporter, Path::new("hw01.ipynb"), None, &ExportOptions::default())
        .await
        .expect_err("both attempts fail");

    assert!(matches!(err, ConversionError::LatexFailed { .. }));
    assert_eq!(exporter.calls.lock().expect("calls poisoned").len(), 2);
}

#[tokio::test]
async fn conflicting_xecjk_flags_are_rejected_up_front() {
    let exporter = FlakyLatex::default();
    let options = ExportOptions::builder().xecjk(true).no_xecjk(true).build();

    let err = export_notebook(&exporter, Path::new("hw01.ipynb"), None, &options)
        .await
        .expect_err("conflict");

    assert!(matches!(err, ConversionError::ConflictingTemplates));
    assert!(exporter.calls.lock().expect("calls poisoned").is_empty());
}

#[tokio::test]
async fn explicit_destination_and_html_route() {
    let exporter = FlakyLatex::default();
    let options = ExportOptions::builder().exporter(ExporterKind::Html).build();

    let pdf = export_notebook(&exporter, Path::new("hw01.ipynb"), Some(Path::new("out/report.pdf")), &options)
        .await
        .expect("html does not fail");

    assert_eq!(pdf, PathBuf::from("out/report.pdf"));
    assert_eq!(default_destination(Path::new("a/b.ipynb")), PathBuf::from("a/b.pdf"));
}

#[tokio::test]
async fn no_retry_when_the_exporter_cannot_apply_xecjk() {
    let exporter = FlakyLatex {
        no_cjk: true,
        ..Default::default()
    };

    let err = export_notebook(&exporter, Path::new("hw01.ipynb"), None, &ExportOptions::default())
        .await
        .expect_err("single attempt fails");

    assert!(matches!(err, ConversionError::LatexFailed { .. }));
    assert_eq!(exporter.calls.lock().expect("calls poisoned").len(), 1);
}
