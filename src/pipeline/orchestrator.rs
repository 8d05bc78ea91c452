// 全入力の逐次実行

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::merged::ExtractionConfig;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::job_runner::{ItemOutcome, ItemStatus, process_path};
use crate::pipeline::output::write_atomic;
use crate::pipeline::sink::LogSink;

/// Inputs sharing one [`ExtractionConfig`].
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub inputs: Vec<PathBuf>,
    pub config: ExtractionConfig,
}

/// Per-input outcomes of one batch, in input order.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn files_written(&self) -> usize {
        self.items.iter().map(|i| i.files_written.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().map(|i| i.errors.len()).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| !i.is_clean())
    }

    pub fn was_cancelled(&self) -> bool {
        self.items.iter().any(|i| i.status == ItemStatus::Cancelled)
    }
}

/// Process `inputs` one after another.
/// One input's failure does NOT prevent the others from running; once
/// `cancel` is set the remaining inputs are reported as cancelled.
pub fn run_batch(
    inputs: &[PathBuf],
    config: &ExtractionConfig,
    sink: &mut dyn LogSink,
    cancel: &CancelToken,
) -> BatchReport {
    let mut report = BatchReport::default();

    for path in inputs {
        if cancel.is_cancelled() {
            report.items.push(ItemOutcome::cancelled(path));
            continue;
        }
        info!(path = %path.display(), "processing input");
        report.items.push(process_path(path, config, sink, cancel));
    }

    if report.was_cancelled() {
        sink.record("... Cancelled");
    }
    report
}

/// Run multiple batches, collecting their reports.
pub fn run_all_jobs(
    jobs: &[BatchJob],
    sink: &mut dyn LogSink,
    cancel: &CancelToken,
) -> Vec<BatchReport> {
    jobs.iter()
        .map(|job| run_batch(&job.inputs, &job.config, sink, cancel))
        .collect()
}

/// Write `reports` as pretty-printed JSON to `path`.
pub fn write_report(reports: &[BatchReport], path: &Path) -> crate::error::Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    write_atomic(path, json.as_bytes())
}
