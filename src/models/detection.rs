//! Decoded symbol readings.
//!
//! A `Detection` is produced fresh for every frame by the decoder and is
//! discarded once the pipeline has finished with that frame.

use serde::{Deserialize, Serialize};

/// Symbologies the pipeline asks the decoder for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind {
    QrCode,
    Ean13,
    UpcA,
    Code128,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::QrCode => "QRCODE",
            SymbolKind::Ean13 => "EAN13",
            SymbolKind::UpcA => "UPCA",
            SymbolKind::Code128 => "CODE128",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub symbol: SymbolKind,
    pub text: String,
    /// Ordered outline points; empty or at least four.
    #[serde(default)]
    pub polygon: Vec<Point>,
    #[serde(default)]
    pub rect: Rect,
}

impl Detection {
    pub fn new(symbol: SymbolKind, text: impl Into<String>) -> Self {
        Self {
            symbol,
            text: text.into(),
            polygon: Vec::new(),
            rect: Rect::default(),
        }
    }

    pub fn with_polygon(mut self, points: impl IntoIterator<Item = (i32, i32)>) -> Self {
        self.polygon = points.into_iter().map(Point::from).collect();
        self
    }

    /// Only quadrilateral outlines are drawn on persisted frames.
    pub fn has_quad_outline(&self) -> bool {
        self.polygon.len() == 4
    }
}

/// Strip surrounding whitespace and stray line breaks from decoded text.
pub fn clean_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect()
}
