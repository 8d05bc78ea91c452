use std::path::{Path, PathBuf};

use super::job::Job;
use super::settings::Settings;
use crate::error::Pdf2ImgError;
use crate::segment::regions::{EdgePairing, SegmentParams};

/// Settings for one batch after job overrides are applied.
///
/// `start_index` is accepted for compatibility with existing job files; the
/// output naming does not use it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub output_dir: PathBuf,
    pub start_index: u32,
    pub prefix: String,
    pub decompose: bool,
    pub std_threshold: f64,
    pub row_kernel_width: usize,
    pub col_kernel_width: usize,
    pub edge_pairing: EdgePairing,
    /// 1-based pages to walk; `None` means every page.
    pub pages: Option<Vec<u32>>,
}

impl ExtractionConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    /// 相対パスは `base_dir` (ジョブファイルのディレクトリ) 基準で解決する。
    pub fn new(settings: &Settings, job: &Job, base_dir: &Path) -> crate::error::Result<Self> {
        let config = ExtractionConfig {
            output_dir: resolve_path(base_dir, &job.output_dir),
            start_index: job.start_index.unwrap_or(settings.start_index),
            prefix: job.prefix.clone().unwrap_or_else(|| settings.prefix.clone()),
            decompose: job.decompose.unwrap_or(settings.decompose),
            std_threshold: job.std_threshold.unwrap_or(settings.std_threshold),
            row_kernel_width: job.row_kernel_width.unwrap_or(settings.row_kernel_width),
            col_kernel_width: job.col_kernel_width.unwrap_or(settings.col_kernel_width),
            edge_pairing: job.edge_pairing.unwrap_or(settings.edge_pairing),
            pages: job.pages.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults from [`Settings::default`] writing into `output_dir`.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        let settings = Settings::default();
        ExtractionConfig {
            output_dir: output_dir.into(),
            start_index: settings.start_index,
            prefix: settings.prefix,
            decompose: settings.decompose,
            std_threshold: settings.std_threshold,
            row_kernel_width: settings.row_kernel_width,
            col_kernel_width: settings.col_kernel_width,
            edge_pairing: settings.edge_pairing,
            pages: None,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.std_threshold.is_finite() || self.std_threshold < 0.0 {
            return Err(Pdf2ImgError::config(format!(
                "std_threshold must be a finite value >= 0, got {}",
                self.std_threshold
            )));
        }
        if self.row_kernel_width == 0 || self.col_kernel_width == 0 {
            return Err(Pdf2ImgError::config(format!(
                "kernel widths must be positive, got row={} col={}",
                self.row_kernel_width, self.col_kernel_width
            )));
        }
        Ok(())
    }

    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            std_threshold: self.std_threshold,
            row_kernel_width: self.row_kernel_width,
            col_kernel_width: self.col_kernel_width,
            edge_pairing: self.edge_pairing,
        }
    }

    /// Whether page `page_num` (1-based) is selected.
    pub fn includes_page(&self, page_num: u32) -> bool {
        self.pages
            .as_ref()
            .is_none_or(|pages| pages.binary_search(&page_num).is_ok())
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
