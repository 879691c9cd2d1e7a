use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scanner::{ArtifactNaming, DedupPolicy};

/// Deployment mode; each one maps to exactly one dedup policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Stored footage: every code is handled once per run.
    #[default]
    Batch,
    /// Live feed: codes re-trigger after the reset window.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub database_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub mode: ScanMode,
    pub scan_reset_window_secs: u64,
    pub persist_once_per_run: bool,
    pub artifact_naming: ArtifactNaming,
    pub frame_stride: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            database_path: "inventory.sqlite3".into(),
            artifact_dir: "detected_frames".into(),
            mode: ScanMode::Batch,
            scan_reset_window_secs: 5,
            persist_once_per_run: true,
            artifact_naming: ArtifactNaming::FrameIndex,
            frame_stride: 1,
        }
    }
}

impl ScannerSettings {
    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn dedup_policy(&self) -> DedupPolicy {
        match self.mode {
            ScanMode::Batch => DedupPolicy::RunScoped,
            ScanMode::Continuous => DedupPolicy::TtlGated {
                window: Duration::from_secs(self.scan_reset_window_secs),
                persist_once_per_run: self.persist_once_per_run,
            },
        }
    }

    pub fn frame_stride(&self) -> u64 {
        self.frame_stride.max(1)
    }
}
