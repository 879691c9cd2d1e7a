pub mod annotate;
pub mod clock;
pub mod controller;
pub mod decoder;
pub mod dedup;
pub mod orchestrator;
pub mod persister;
pub mod preprocess;
pub mod source;

pub use clock::{Clock, SystemClock};
pub use controller::{FinishedScan, ScanController};
pub use decoder::{ManifestDecoder, SymbolDecoder};
pub use dedup::{DedupCache, DedupPolicy, RunSeenSet, TemporalFilter, Verdict};
pub use orchestrator::{Orchestrator, RunError, RunReport, RunState, StopReason};
pub use persister::{ArtifactKey, ArtifactNaming, FramePersister};
pub use preprocess::{normalize, NormalizedFrame};
pub use source::{
    FileSourceOpener, FrameSource, ImageSequenceSource, MemoryOpener, MemorySource,
    SourceError, SourceOpener, SourceSelector,
};
