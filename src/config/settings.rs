use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::segment::regions::EdgePairing;

/// `settings.yaml`: batch-wide defaults, each overridable per job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub prefix: String,
    pub start_index: u32,
    pub decompose: bool,
    pub std_threshold: f64,
    pub row_kernel_width: usize,
    pub col_kernel_width: usize,
    pub edge_pairing: EdgePairing,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            prefix: "_image_".to_string(),
            start_index: 0,
            decompose: false,
            std_threshold: 5.0,
            row_kernel_width: 21,
            col_kernel_width: 11,
            edge_pairing: EdgePairing::Truncate,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::Pdf2ImgError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// ジョブファイルと同じディレクトリの `settings.yaml` を読む。
    /// 無ければデフォルト値。
    pub fn for_job_file(job_file: &Path) -> crate::error::Result<Self> {
        let dir = match job_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let settings_path = dir.join("settings.yaml");

        if settings_path.is_file() {
            debug!(path = %settings_path.display(), "loading settings");
            Self::from_file(&settings_path)
        } else {
            debug!(dir = %dir.display(), "no settings.yaml, using defaults");
            Ok(Self::default())
        }
    }
}
