#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # otter-grade
//!
//! Grades notebooks against the tests embedded in their metadata, prepares
//! those tests, and exports notebooks to PDF.
//!
//! Configuration is read from the environment (and a `.env` file):
//! `OTTER_CASE_TIMEOUT_SECS`, `OTTER_MAX_OPERATIONS`, `OTTER_VERBOSE` and
//! `OTTER_EXPORT_TIMEOUT_SECS`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use otter_grade::{
    ArtifactCodec, RhaiEvaluator, RunOptions,
    export::{ExportOptions, ExporterKind, NbconvertExporter, export_notebook},
    grade_notebook,
    test_files::metadata::embed_file,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a notebook
    Grade {
        /// Only run these tests
        tests:    Vec<String>,
        /// Print results as JSON
        json:     bool,
        /// Notebook to grade
        notebook: PathBuf,
    },
    /// Encode an exception-format test source
    Encode {
        /// Test source
        file: PathBuf,
    },
    /// Embed a test into a notebook's metadata
    Embed {
        /// Notebook to modify
        notebook: PathBuf,
        /// Test to embed
        file:     PathBuf,
    },
    /// Export a notebook to PDF
    Export {
        /// Where to write the PDF
        dest:       Option<PathBuf>,
        /// Conversion route
        exporter:   ExporterKind,
        /// Keep only marked regions
        filtering:  bool,
        /// Break pages between regions
        pagebreaks: bool,
        /// Keep intermediate files
        save:       bool,
        /// Never use the xeCJK template
        no_xecjk:   bool,
        /// Notebook to export
        notebook:   PathBuf,
    },
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses a notebook path
    fn nb() -> impl Parser<PathBuf> {
        positional("NOTEBOOK").help("Path to a notebook")
    }

    /// parses a test file path
    fn f() -> impl Parser<PathBuf> {
        positional("FILE").help("Path to a test file (.json for OK format, otherwise exception format)")
    }

    let grade = {
        let tests = long("test")
            .short('t')
            .help("Name of an embedded test to run, may be repeated; all tests by default")
            .argument::<String>("NAME")
            .many();
        let json = long("json").help("Print results as JSON").switch();
        let notebook = nb();
        construct!(Cmd::Grade {
            tests,
            json,
            notebook
        })
        .to_options()
        .command("grade")
        .help("Grade a notebook against its embedded tests")
    };

    let encode = {
        let file = f();
        construct!(Cmd::Encode { file })
            .to_options()
            .command("encode")
            .help("Print the artifact string for an exception-format test")
    };

    let embed = {
        let notebook = nb();
        let file = f();
        construct!(Cmd::Embed { notebook, file })
            .to_options()
            .command("embed")
            .help("Store a test in a notebook's metadata")
    };

    let export = {
        let dest = long("dest")
            .help("Where to write the PDF, next to the notebook by default")
            .argument::<PathBuf>("PATH")
            .optional();
        let exporter = long("exporter")
            .help("Conversion route, latex or html")
            .argument::<ExporterKind>("KIND")
            .fallback(ExporterKind::Latex);
        let filtering = long("filtering")
            .help("Keep only the regions marked for export")
            .switch();
        let pagebreaks = long("pagebreaks")
            .help("Break pages between filtered regions")
            .switch();
        let save = long("save").help("Keep intermediate files").switch();
        let no_xecjk = long("no-xecjk")
            .help("Never fall back to the xeCJK LaTeX template")
            .switch();
        let notebook = nb();
        construct!(Cmd::Export {
            dest,
            exporter,
            filtering,
            pagebreaks,
            save,
            no_xecjk,
            notebook
        })
        .to_options()
        .command("export")
        .help("Export a notebook to PDF")
    };

    let cmd = construct!([grade, encode, embed, export]);

    cmd.to_options()
        .descr("Test specifications and grading for notebook assignments")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match options() {
        Cmd::Grade {
            tests,
            json,
            notebook,
        } => {
            let label = notebook.display().to_string();
            let results = tokio::task::spawn_blocking(move || {
                let evaluator = RhaiEvaluator::from_config();
                grade_notebook(&notebook, &evaluator, &tests, RunOptions::from_config())
            })
            .await
            .context("grading task panicked")?
            .with_context(|| format!("Could not grade `{label}`"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print!("{results}");
            }
        }
        Cmd::Encode { file } => {
            let evaluator = RhaiEvaluator::new();
            let encoded = ArtifactCodec::new(&evaluator)
                .encode_file(&file)
                .with_context(|| format!("Could not encode `{}`", file.display()))?;
            println!("{encoded}");
        }
        Cmd::Embed { notebook, file } => {
            let evaluator = RhaiEvaluator::new();
            let name = embed_file(&notebook, &file, &ArtifactCodec::new(&evaluator))
                .with_context(|| {
                    format!("Could not embed `{}` into `{}`", file.display(), notebook.display())
                })?;
            eprintln!("Embedded test `{name}` into {}", notebook.display());
        }
        Cmd::Export {
            dest,
            exporter,
            filtering,
            pagebreaks,
            save,
            no_xecjk,
            notebook,
        } => {
            let options = ExportOptions::builder()
                .exporter(exporter)
                .filtering(filtering)
                .pagebreaks(pagebreaks)
                .save_intermediate(save)
                .no_xecjk(no_xecjk)
                .build();
            let pdf =
                export_notebook(&NbconvertExporter::default(), &notebook, dest.as_deref(), &options)
                    .await?;
            println!("{}", pdf.display());
        }
    };

    Ok(())
}
