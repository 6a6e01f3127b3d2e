#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! PDF export of notebooks. The conversion itself is a collaborator behind
//! [`PdfExporter`]; this module owns the options, the destination rules and
//! the xeCJK fallback for LaTeX failures.

use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use bon::Builder;
use tracing::{info, warn};

use crate::{
    config,
    constants::{LATEX_TEMPLATE, LATEX_XECJK_TEMPLATE},
    process::run_collect,
};

/// Which route the conversion takes to PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExporterKind {
    /// Notebook to LaTeX to PDF.
    #[default]
    Latex,
    /// Notebook to HTML to PDF.
    Html,
}

impl FromStr for ExporterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latex" => Ok(ExporterKind::Latex),
            "html" => Ok(ExporterKind::Html),
            other => Err(format!("unknown exporter `{other}`, expected `latex` or `html`")),
        }
    }
}

impl fmt::Display for ExporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterKind::Latex => write!(f, "latex"),
            ExporterKind::Html => write!(f, "html"),
        }
    }
}

/// Options for a single export.
#[derive(Debug, Clone, Default, Builder)]
pub struct ExportOptions {
    /// Keep only the regions marked for export.
    #[builder(default)]
    pub filtering:         bool,
    /// Break pages between filtered regions, only meaningful with
    /// `filtering`.
    #[builder(default)]
    pub pagebreaks:        bool,
    /// Conversion route.
    #[builder(default)]
    pub exporter:          ExporterKind,
    /// Template name overriding the route's default.
    #[builder(into)]
    pub template:          Option<String>,
    /// Use the LaTeX template with CJK support.
    #[builder(default)]
    pub xecjk:             bool,
    /// Never fall back to the CJK template.
    #[builder(default)]
    pub no_xecjk:          bool,
    /// Keep intermediate `.tex`/`.html` files next to the PDF.
    #[builder(default)]
    pub save_intermediate: bool,
    /// Deadline for the conversion, the configured default when `None`.
    pub timeout:           Option<Duration>,
}

impl ExportOptions {
    /// Template the conversion should use, `None` for the converter's own
    /// default.
    pub fn template_name(&self) -> Option<&str> {
        match (&self.template, self.exporter) {
            (Some(template), _) => Some(template.as_str()),
            (None, ExporterKind::Latex) if self.xecjk => Some(LATEX_XECJK_TEMPLATE),
            (None, ExporterKind::Latex) => Some(LATEX_TEMPLATE),
            (None, ExporterKind::Html) => None,
        }
    }

    /// Deadline for the conversion.
    pub fn deadline(&self) -> Duration {
        self.timeout.unwrap_or_else(config::export_timeout)
    }
}

/// Reasons an export failed.
#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    /// Both `xecjk` and `no_xecjk` were requested.
    #[error("xeCJK LaTeX template indicated but disallowed")]
    ConflictingTemplates,
    /// The LaTeX toolchain failed; eligible for the xeCJK retry.
    #[error("LaTeX failed while exporting `{notebook}`:\n{log}")]
    LatexFailed {
        /// Notebook being exported.
        notebook: String,
        /// Converter output.
        log:      String,
    },
    /// Any other converter failure.
    #[error("Could not export `{notebook}`: {reason}")]
    Failed {
        /// Notebook being exported.
        notebook: String,
        /// What went wrong.
        reason:   String,
    },
}

/// Converts a notebook file into a PDF.
#[allow(async_fn_in_trait)]
pub trait PdfExporter {
    /// Writes the PDF for `notebook` to `dest`.
    async fn convert(
        &self,
        notebook: &Path,
        dest: &Path,
        options: &ExportOptions,
    ) -> Result<(), ConversionError>;

    /// Whether a conversion with the xeCJK template differs from one
    /// without it.
    fn supports_xecjk(&self) -> bool {
        true
    }
}

/// Where the PDF of `notebook` goes when no destination is given.
pub fn default_destination(notebook: &Path) -> PathBuf {
    notebook.with_extension("pdf")
}

/// Exports `notebook` to PDF with `exporter` and returns the PDF path.
///
/// When a LaTeX conversion fails and neither `xecjk` nor `no_xecjk` was set,
/// the conversion is retried once with the xeCJK template, provided the
/// exporter can apply it.
pub async fn export_notebook<X: PdfExporter>(
    exporter: &X,
    notebook: &Path,
    dest: Option<&Path>,
    options: &ExportOptions,
) -> Result<PathBuf, ConversionError> {
    if options.xecjk && options.no_xecjk {
        return Err(ConversionError::ConflictingTemplates);
    }

    let dest = dest.map_or_else(|| default_destination(notebook), Path::to_path_buf);

    match exporter.convert(notebook, &dest, options).await {
        Err(ConversionError::LatexFailed { .. })
            if options.exporter == ExporterKind::Latex
                && options.template.is_none()
                && !options.xecjk
                && !options.no_xecjk
                && exporter.supports_xecjk() =>
        {
            warn!(notebook = %notebook.display(), "LaTeX failed, retrying with the xeCJK template");
            let retry = ExportOptions {
                xecjk: true,
                ..options.clone()
            };
            exporter.convert(notebook, &dest, &retry).await?;
        }
        result => result?,
    }

    info!(pdf = %dest.display(), "exported notebook");
    Ok(dest)
}

/// Exporter that shells out to `jupyter nbconvert`.
#[derive(Debug, Clone, Builder)]
pub struct NbconvertExporter {
    /// Program to run.
    #[builder(default = "jupyter".to_string(), into)]
    program:      String,
    /// Directory holding the `via_latex` templates, passed as an extra
    /// template base directory.
    #[builder(into)]
    template_dir: Option<PathBuf>,
}

impl Default for NbconvertExporter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl NbconvertExporter {
    /// Arguments for one `nbconvert` run.
    fn args(&self, to: &str, notebook: &Path, dest: &Path, template: Option<&str>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["nbconvert".into(), "--to".into(), to.into()];

        if let Some(dir) = &self.template_dir {
            let mut flag = OsString::from("--TemplateExporter.extra_template_basedirs=");
            flag.push(dir);
            args.push(flag);
        }
        if let Some(template) = template
            && (self.template_dir.is_some() || ![LATEX_TEMPLATE, LATEX_XECJK_TEMPLATE].contains(&template))
        {
            args.push("--template".into());
            args.push(template.into());
        }

        if let Some(dir) = dest.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            args.push("--output-dir".into());
            args.push(dir.into());
        }
        if let Some(stem) = dest.file_stem() {
            args.push("--output".into());
            args.push(stem.into());
        }
        args.push(notebook.into());
        args
    }

    /// Runs `nbconvert` once and maps its failure.
    async fn run(
        &self,
        to: &str,
        notebook: &Path,
        dest: &Path,
        options: &ExportOptions,
    ) -> Result<(), ConversionError> {
        let failed = |reason: String| ConversionError::Failed {
            notebook: notebook.display().to_string(),
            reason,
        };

        let args = self.args(to, notebook, dest, options.template_name());
        let collected = run_collect(&self.program, &args, None, Some(options.deadline()))
            .await
            .map_err(|e| failed(format!("{e:#}")))?;

        if collected.success() {
            return Ok(());
        }

        let log = collected.output();
        if options.exporter == ExporterKind::Latex && log.contains("LatexFailed") {
            Err(ConversionError::LatexFailed {
                notebook: notebook.display().to_string(),
                log,
            })
        } else {
            Err(failed(log))
        }
    }
}

impl PdfExporter for NbconvertExporter {
    async fn convert(
        &self,
        notebook: &Path,
        dest: &Path,
        options: &ExportOptions,
    ) -> Result<(), ConversionError> {
        if options.filtering || options.pagebreaks {
            warn!("nbconvert exports whole notebooks, ignoring filtering and pagebreaks");
        }

        let to = match options.exporter {
            ExporterKind::Latex => "pdf",
            ExporterKind::Html => "webpdf",
        };
        self.run(to, notebook, dest, options).await?;

        if options.save_intermediate {
            let (to, extension) = match options.exporter {
                ExporterKind::Latex => ("latex", "tex"),
                ExporterKind::Html => ("html", "html"),
            };
            self.run(to, notebook, &dest.with_extension(extension), options)
                .await?;
        }
        Ok(())
    }

    /// The LaTeX templates are only passed on when `template_dir` holds them.
    fn supports_xecjk(&self) -> bool {
        self.template_dir.is_some()
    }
}
