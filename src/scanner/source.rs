//! Frame sources: where a run's frames come from.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, warn};
use thiserror::Error;

use crate::models::{PixelFormat, RawFrame};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("camera {0} is not available")]
    CameraUnavailable(u32),
    #[error("source {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("source {} could not be read: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("source {} contains no frames", .0.display())]
    Empty(PathBuf),
}

/// What to open: an integer camera index or a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    Camera(u32),
    File(PathBuf),
}

impl FromStr for SourceSelector {
    type Err = SourceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SourceError::NotFound(PathBuf::new()));
        }
        match raw.parse::<u32>() {
            Ok(index) => Ok(SourceSelector::Camera(index)),
            Err(_) => Ok(SourceSelector::File(PathBuf::from(raw))),
        }
    }
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSelector::Camera(index) => write!(f, "camera {index}"),
            SourceSelector::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A stream of frames. `None` ends the stream; read failures end it too.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Option<RawFrame>;
}

/// Acquires a frame source for a selector. Failure is fatal to the run.
pub trait SourceOpener: Send + Sync {
    fn open(&self, selector: &SourceSelector) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// Opens image files and frame directories. Cameras need an external opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSourceOpener;

impl SourceOpener for FileSourceOpener {
    fn open(&self, selector: &SourceSelector) -> Result<Box<dyn FrameSource>, SourceError> {
        match selector {
            SourceSelector::Camera(index) => Err(SourceError::CameraUnavailable(*index)),
            SourceSelector::File(path) => Ok(Box::new(ImageSequenceSource::open(path)?)),
        }
    }
}

/// One image file, or every image in a directory in lexical name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }

        let paths = if path.is_dir() {
            list_frames(path)?
        } else {
            vec![path.to_path_buf()]
        };

        if paths.is_empty() {
            return Err(SourceError::Empty(path.to_path_buf()));
        }
        debug!("Opened {} with {} frame(s)", path.display(), paths.len());

        Ok(Self { paths, next: 0 })
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Option<RawFrame> {
        let path = self.paths.get(self.next)?;
        let index = self.next as u64;
        self.next += 1;

        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                warn!("Failed to read frame {}: {err}; ending stream", path.display());
                self.next = self.paths.len();
                return None;
            }
        };

        Some(RawFrame {
            index,
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgb8,
            data: image.into_raw(),
        })
    }
}

/// Frames already held in memory, replayed in order.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<RawFrame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Option<RawFrame> {
        self.frames.pop_front()
    }
}

/// Serves the same in-memory frames for any selector.
#[derive(Debug, Default, Clone)]
pub struct MemoryOpener {
    frames: Vec<RawFrame>,
}

impl MemoryOpener {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self { frames }
    }
}

impl SourceOpener for MemoryOpener {
    fn open(&self, _selector: &SourceSelector) -> Result<Box<dyn FrameSource>, SourceError> {
        Ok(Box::new(MemorySource::new(self.frames.clone())))
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let unreadable = |err: std::io::Error| SourceError::Unreadable {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && has_frame_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
