use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf2img::config::job::JobFile;
use pdf2img::config::merged::{ExtractionConfig, resolve_path};
use pdf2img::config::settings::Settings;
use pdf2img::pipeline::cancel::CancelToken;
use pdf2img::pipeline::job_runner::ItemStatus;
use pdf2img::pipeline::orchestrator::{BatchJob, run_all_jobs, write_report};
use pdf2img::pipeline::sink::TracingSink;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: pdf2img [--report <report.json>] <jobs.yaml>...");
    eprintln!("  Extract embedded images from PDFs (and split images into sub-images)");
    eprintln!("  according to YAML job files.");
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf2img {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdf2img=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Split off --report <path>; everything else is a job file.
    let mut report_path: Option<PathBuf> = None;
    let mut job_file_args: Vec<&str> = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--report" {
            match iter.next() {
                Some(p) => report_path = Some(PathBuf::from(p)),
                None => {
                    eprintln!("ERROR: --report requires a file path");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            job_file_args.push(arg);
        }
    }

    if job_file_args.is_empty() {
        print_usage();
        return ExitCode::FAILURE;
    }

    let mut jobs: Vec<BatchJob> = Vec::new();

    for job_file_arg in job_file_args {
        let job_file_path = Path::new(job_file_arg);

        let settings = match Settings::for_job_file(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file: JobFile = match serde_yml::from_str(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            let config = match ExtractionConfig::new(&settings, job, &job_dir) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("ERROR: Invalid job in {job_file_arg}: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let inputs = job
                .inputs
                .iter()
                .map(|input| resolve_path(&job_dir, input))
                .collect();
            jobs.push(BatchJob { inputs, config });
        }
    }

    let mut sink = TracingSink;
    let reports = run_all_jobs(&jobs, &mut sink, &CancelToken::new());

    let mut has_error = false;
    for report in &reports {
        for item in &report.items {
            match item.status {
                ItemStatus::Failed => eprintln!("ERROR: {}", item.path.display()),
                ItemStatus::Skipped => eprintln!("SKIP: {}", item.path.display()),
                _ if !item.errors.is_empty() => eprintln!(
                    "WARN: {} ({} files, {} errors)",
                    item.path.display(),
                    item.files_written.len(),
                    item.errors.len()
                ),
                _ => eprintln!(
                    "OK: {} ({} files)",
                    item.path.display(),
                    item.files_written.len()
                ),
            }
        }
        has_error |= report.has_errors();
    }

    let files: usize = reports.iter().map(|r| r.files_written()).sum();
    let errors: usize = reports.iter().map(|r| r.error_count()).sum();
    eprintln!("Done: {files} file(s) written, {errors} error(s)");

    if let Some(path) = report_path
        && let Err(e) = write_report(&reports, &path)
    {
        eprintln!("ERROR: Failed to write report {}: {e}", path.display());
        has_error = true;
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
