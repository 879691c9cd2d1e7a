use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Detection;

use super::preprocess::NormalizedFrame;

/// Symbol localization and decoding. Results may repeat the same text.
pub trait SymbolDecoder: Send {
    fn decode(&mut self, frame: &NormalizedFrame) -> Vec<Detection>;
}

impl<F> SymbolDecoder for F
where
    F: FnMut(&NormalizedFrame) -> Vec<Detection> + Send,
{
    fn decode(&mut self, frame: &NormalizedFrame) -> Vec<Detection> {
        self(frame)
    }
}

/// Replays decoder output recorded per frame index in a JSON file:
///
/// ```json
/// { "0": [{ "symbol": "EAN13", "text": "4006381333931",
///           "polygon": [{"x": 1, "y": 1}, ...] }] }
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManifestDecoder {
    frames: BTreeMap<u64, Vec<Detection>>,
}

impl ManifestDecoder {
    pub fn new(frames: BTreeMap<u64, Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections from {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse detections in {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl SymbolDecoder for ManifestDecoder {
    fn decode(&mut self, frame: &NormalizedFrame) -> Vec<Detection> {
        self.frames.get(&frame.index).cloned().unwrap_or_default()
    }
}
