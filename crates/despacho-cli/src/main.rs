use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use despacho_core::Record;
use despacho_ingest::Orchestrator;

/// Dispatch record extractor - recover trip records from depot report PDFs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new record store from one or more report PDFs
    Create {
        /// Path(s) to the PDF report(s)
        #[arg(long = "pdf", num_args = 1.., required = true)]
        pdfs: Vec<PathBuf>,

        /// Output store path
        #[arg(long, default_value = "dispatch-records.json")]
        out: PathBuf,

        /// Enable OCR for scanned reports (requires pdftoppm + tesseract)
        #[arg(long)]
        ocr: bool,
    },

    /// Merge newly extracted records into an existing store, without duplicates
    Append {
        /// Existing store to merge into
        #[arg(long)]
        store: PathBuf,

        /// Path(s) to the PDF report(s)
        #[arg(long = "pdf", num_args = 1.., required = true)]
        pdfs: Vec<PathBuf>,

        /// Output store path (defaults to overwriting the input store)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Enable OCR for scanned reports (requires pdftoppm + tesseract)
        #[arg(long)]
        ocr: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Create { pdfs, out, ocr } => {
            let records = process_pdfs(&pdfs, ocr)?;
            let path = despacho_store::create(&out, &records)
                .with_context(|| format!("failed to write store {}", out.display()))?;
            println!(
                "{} {} ({} records)",
                "written:".green(),
                path.display(),
                records.len()
            );
        }
        Command::Append {
            store,
            pdfs,
            out,
            ocr,
        } => {
            let records = process_pdfs(&pdfs, ocr)?;
            let path = despacho_store::append(&store, &records, out.as_deref())
                .with_context(|| format!("failed to merge into {}", store.display()))?;
            println!("{} {}", "merged into:".green(), path.display());
        }
    }

    Ok(())
}

/// Run extraction over every document, sequentially, collecting all records.
///
/// A document that cannot be opened at all aborts the run; documents that
/// merely yield nothing are reported and skipped.
fn process_pdfs(pdfs: &[PathBuf], ocr: bool) -> anyhow::Result<Vec<Record>> {
    let orchestrator = Orchestrator::with_default_sources();
    let bar = ProgressBar::new(pdfs.len() as u64);

    let mut all_records = Vec::new();
    for pdf in pdfs {
        let extraction = orchestrator
            .extract(pdf, ocr, |_| {})
            .with_context(|| format!("extraction failed for {}", pdf.display()))?;

        let pages_info = if extraction.per_page.is_empty() {
            "-".to_string()
        } else {
            extraction
                .per_page
                .iter()
                .enumerate()
                .map(|(i, n)| format!("p{}:{}", i + 1, n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        bar.println(format!(
            "{} strategy={} records={} per page: {}",
            pdf.display(),
            extraction.strategy.cyan(),
            extraction.records.len(),
            pages_info
        ));

        all_records.extend(extraction.records);
        bar.inc(1);
    }
    bar.finish_and_clear();

    if all_records.is_empty() {
        tracing::warn!("no records detected in the supplied documents");
    }

    Ok(all_records)
}
