use bibmerge::export::{ExportFormat, Summary, TableWriter};
use bibmerge::report::Report;
use bibmerge::{BibMerger, MergeConfig, MergeError, MergeOutcome};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bibmerge")]
#[command(version = "0.1.0")]
#[command(about = "Merge RIS and plain-text citation exports into one deduplicated table", long_about = None)]
struct Args {
    /// Input .ris or .txt export file(s)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Look up missing abstracts by DOI
    #[arg(long)]
    fetch_abstracts: bool,

    /// Disable CrossRef abstract lookup
    #[arg(long)]
    no_crossref: bool,

    /// Disable PubMed abstract lookup
    #[arg(long)]
    no_pubmed: bool,

    /// Disable caching of fetched abstracts
    #[arg(long)]
    no_cache: bool,

    /// Keep duplicate records
    #[arg(long)]
    no_dedup: bool,

    /// Output table format (csv or json)
    #[arg(long, short, default_value = "csv")]
    format: ExportFormat,

    /// Output path without extension; duplicates and summary tables get suffixes
    #[arg(long, short, default_value = "bibmerge_output")]
    output: PathBuf,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("bibmerge=debug")
            .init();
    }

    let config = MergeConfig {
        fetch_abstracts: args.fetch_abstracts,
        use_crossref: !args.no_crossref,
        use_pubmed: !args.no_pubmed,
        cache_enabled: !args.no_cache,
        deduplicate: !args.no_dedup,
        ..MergeConfig::default()
    };

    let merger = match BibMerger::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{} Failed to initialize: {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("Merging {} files...", args.files.len());

    let outcome = match merger.run(&args.files).await {
        Ok(outcome) => outcome,
        Err(MergeError::NoValidInputs) => {
            eprintln!(
                "{} None of the inputs is a non-empty .ris or .txt file",
                "Error:".red().bold()
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let report = Report::new(&outcome);
    report.print();

    if outcome.records.is_empty() {
        eprintln!(
            "{} No records could be extracted from the given files",
            "Error:".red().bold()
        );
        return ExitCode::FAILURE;
    }

    let writer = args.format.writer();
    match write_outputs(writer.as_ref(), &args.output, &outcome, report.summary()) {
        Ok(written) => {
            for path in written {
                println!("Wrote {}", path.display().to_string().cyan());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} Failed to write output: {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn write_outputs(
    writer: &dyn TableWriter,
    stem: &Path,
    outcome: &MergeOutcome,
    summary: &Summary,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let ext = writer.format().extension();
    let mut written = Vec::new();

    let records_path = with_suffix(stem, "", ext);
    fs::write(&records_path, writer.write_records(&outcome.records)?)?;
    written.push(records_path);

    if !outcome.removed.is_empty() {
        let audit_path = with_suffix(stem, "_duplicates", ext);
        fs::write(&audit_path, writer.write_audit(&outcome.removed)?)?;
        written.push(audit_path);
    }

    let summary_path = with_suffix(stem, "_summary", ext);
    fs::write(&summary_path, writer.write_summary(summary)?)?;
    written.push(summary_path);

    Ok(written)
}

fn with_suffix(stem: &Path, suffix: &str, ext: &str) -> PathBuf {
    let name = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bibmerge_output".to_string());
    stem.with_file_name(format!("{}{}.{}", name, suffix, ext))
}
