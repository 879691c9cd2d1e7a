use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::models::{Detection, SymbolKind};

/// How artifact file names are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactNaming {
    /// `detected_0007.png`
    #[default]
    FrameIndex,
    /// `EAN13_4006381333931.png`
    CodeIdentifier,
}

impl ArtifactNaming {
    pub fn key_for(&self, frame_index: u64, detection: &Detection) -> ArtifactKey {
        match self {
            ArtifactNaming::FrameIndex => ArtifactKey::FrameIndex(frame_index),
            ArtifactNaming::CodeIdentifier => ArtifactKey::Code {
                symbol: detection.symbol,
                text: detection.text.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    FrameIndex(u64),
    Code { symbol: SymbolKind, text: String },
}

impl ArtifactKey {
    pub fn file_name(&self) -> String {
        match self {
            ArtifactKey::FrameIndex(index) => format!("detected_{index:04}.png"),
            ArtifactKey::Code { symbol, text } => {
                format!("{}_{}.png", symbol.as_str(), sanitize(text))
            }
        }
    }
}

/// Keep ASCII letters, digits, `-` and `_`.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Writes annotated frames into one directory, one PNG per key.
#[derive(Debug, Clone)]
pub struct FramePersister {
    dir: PathBuf,
}

impl FramePersister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writing the same key again overwrites the earlier file.
    pub fn persist(&self, image: &RgbImage, key: &ArtifactKey) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create artifact directory {}", self.dir.display())
        })?;

        let path = self.dir.join(key.file_name());
        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;
        Ok(path)
    }
}
