//! The sequential scan loop.
//!
//! One call to [`Orchestrator::process`] is one run: open the source, then
//! for every frame preprocess, decode, deduplicate, reconcile and persist,
//! until the stream ends or the stop token fires. Nothing reads ahead; the
//! next frame is requested only after the current one is fully handled.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Database;
use crate::inventory::{InventoryReconciler, ReconcileOutcome};
use crate::models::{clean_text, Detection, Frame, FrameError};

use super::annotate::annotate;
use super::clock::{Clock, SystemClock};
use super::decoder::SymbolDecoder;
use super::dedup::{dedup_within_frame, DedupPolicy, RunSeenSet, TemporalFilter};
use super::persister::{ArtifactKey, ArtifactNaming, FramePersister};
use super::preprocess::normalize;
use super::source::{SourceError, SourceOpener, SourceSelector};

// Set to false to silence per-frame logging from the scan loop
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Opening,
    Streaming,
    Draining,
    Closed,
}

impl RunState {
    /// Legal edges of the run lifecycle. `Closed` only leads back to `Idle`.
    pub fn can_become(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Opening, Streaming)
                | (Opening, Closed)
                | (Streaming, Draining)
                | (Streaming, Closed)
                | (Draining, Closed)
                | (Closed, Idle)
        )
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("frame {index} cannot be normalized: {source}")]
    MalformedFrame {
        index: u64,
        #[source]
        source: FrameError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndOfStream,
    Stopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::Stopped => write!(f, "stopped"),
        }
    }
}

/// Aggregate produced when a run closes normally.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: String,
    pub policy: DedupPolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub frames_seen: u64,
    pub frames_decoded: u64,
    /// Codes confirmed during the run, in first-confirmation order.
    pub unique_codes: Vec<String>,
    pub updated: u32,
    pub created: u32,
    pub failed: u32,
    pub duplicates_suppressed: u64,
    pub artifacts: Vec<PathBuf>,
    pub artifact_failures: u32,
    pub outcomes: Vec<ReconcileOutcome>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} on {} ({})", self.run_id, self.source, self.stop_reason)?;
        writeln!(f, "  dedup policy: {}", self.policy)?;
        writeln!(
            f,
            "  frames seen: {} (decoded {})",
            self.frames_seen, self.frames_decoded
        )?;
        writeln!(
            f,
            "  unique codes confirmed: {} [{}]",
            self.unique_codes.len(),
            self.unique_codes.join(", ")
        )?;
        writeln!(
            f,
            "  inventory: {} updated, {} created, {} failed",
            self.updated, self.created, self.failed
        )?;
        writeln!(f, "  duplicates suppressed: {}", self.duplicates_suppressed)?;
        write!(
            f,
            "  artifacts written: {} ({} failed)",
            self.artifacts.len(),
            self.artifact_failures
        )
    }
}

#[derive(Debug, Default)]
struct RunTally {
    frames_seen: u64,
    frames_decoded: u64,
    updated: u32,
    created: u32,
    failed: u32,
    duplicates_suppressed: u64,
    artifacts: Vec<PathBuf>,
    artifact_failures: u32,
    outcomes: Vec<ReconcileOutcome>,
}

impl RunTally {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match &outcome {
            ReconcileOutcome::Updated { .. } => self.updated += 1,
            ReconcileOutcome::Created(_) => self.created += 1,
            ReconcileOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Owns every piece of cross-frame state: the dedup cache, the store
/// handle and the stage implementations.
pub struct Orchestrator {
    reconciler: InventoryReconciler,
    decoder: Box<dyn SymbolDecoder>,
    persister: FramePersister,
    naming: ArtifactNaming,
    filter: TemporalFilter,
    clock: Box<dyn Clock>,
    stop: CancellationToken,
    frame_stride: u64,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        reconciler: InventoryReconciler,
        decoder: Box<dyn SymbolDecoder>,
        persister: FramePersister,
        policy: DedupPolicy,
    ) -> Self {
        Self {
            reconciler,
            decoder,
            persister,
            naming: ArtifactNaming::default(),
            filter: TemporalFilter::new(policy),
            clock: Box::new(SystemClock),
            stop: CancellationToken::new(),
            frame_stride: 1,
            state: RunState::Idle,
        }
    }

    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process only frames whose index is a multiple of `stride`.
    pub fn with_frame_stride(mut self, stride: u64) -> Self {
        self.frame_stride = stride.max(1);
        self
    }

    pub fn with_stop_token(mut self, token: CancellationToken) -> Self {
        self.stop = token;
        self
    }

    /// Cancelling this token ends the current run after the frame in hand.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Replace a fired stop token so the instance can run again.
    pub fn rearm(&mut self) -> CancellationToken {
        if self.stop.is_cancelled() {
            self.stop = CancellationToken::new();
        }
        self.stop.clone()
    }

    pub fn policy(&self) -> DedupPolicy {
        self.filter.policy()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn database(&self) -> &Database {
        self.reconciler.database()
    }

    /// Forget every remembered sighting so all codes re-trigger. Batch
    /// runs never fill the cache, so this only matters in TTL mode.
    pub fn reset_scan_cache(&mut self) {
        let cleared = self.filter.cache().len();
        self.filter.reset();
        log_info!("Scan cache reset ({cleared} code(s) forgotten)");
    }

    /// Run one source to completion.
    ///
    /// `Closed` ends a run, not the instance: a later call resets to `Idle`
    /// and starts a new run that shares the dedup cache with earlier ones.
    pub async fn process(
        &mut self,
        selector: &SourceSelector,
        opener: &dyn SourceOpener,
    ) -> Result<RunReport, RunError> {
        match self.state {
            RunState::Idle => {}
            RunState::Closed => self.transition(RunState::Idle),
            abandoned => {
                log_warn!("Previous run was dropped while {abandoned:?}; starting over");
                self.state = RunState::Idle;
            }
        }
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log_info!(
            "Run {run_id}: opening {selector} with {} dedup",
            self.filter.policy()
        );

        self.transition(RunState::Opening);
        let mut source = match opener.open(selector) {
            Ok(source) => source,
            Err(err) => {
                self.transition(RunState::Closed);
                log_error!("Run {run_id}: failed to open {selector}: {err}");
                return Err(err.into());
            }
        };
        self.transition(RunState::Streaming);

        let mut run = RunSeenSet::new();
        let mut tally = RunTally::default();

        let stop_reason = loop {
            if self.stop.is_cancelled() {
                self.transition(RunState::Draining);
                break StopReason::Stopped;
            }

            let Some(raw) = source.read_frame() else {
                break StopReason::EndOfStream;
            };
            tally.frames_seen += 1;

            if raw.index % self.frame_stride != 0 {
                continue;
            }

            let now = self.clock.now();
            let index = raw.index;
            let frame = match Frame::try_from_raw(raw) {
                Ok(frame) => frame,
                Err(err) => {
                    drop(source);
                    self.transition(RunState::Closed);
                    log_error!("Run {run_id}: frame {index} is malformed: {err}");
                    return Err(RunError::MalformedFrame { index, source: err });
                }
            };

            self.process_frame(&frame, now, &mut run, &mut tally).await;
        };

        drop(source);
        self.transition(RunState::Closed);

        let report = RunReport {
            run_id,
            source: selector.to_string(),
            policy: self.filter.policy(),
            started_at,
            finished_at: Utc::now(),
            stop_reason,
            frames_seen: tally.frames_seen,
            frames_decoded: tally.frames_decoded,
            unique_codes: run.into_codes(),
            updated: tally.updated,
            created: tally.created,
            failed: tally.failed,
            duplicates_suppressed: tally.duplicates_suppressed,
            artifacts: tally.artifacts,
            artifact_failures: tally.artifact_failures,
            outcomes: tally.outcomes,
        };
        log_info!(
            "Run {run_id} closed ({stop_reason}): {} frame(s), {} unique code(s)",
            report.frames_seen,
            report.unique_codes.len()
        );
        Ok(report)
    }

    async fn process_frame(
        &mut self,
        frame: &Frame,
        now: Instant,
        run: &mut RunSeenSet,
        tally: &mut RunTally,
    ) {
        let normalized = normalize(frame);
        let decoded = self.decoder.decode(&normalized);
        tally.frames_decoded += 1;

        let readable: Vec<Detection> = decoded
            .into_iter()
            .filter_map(|mut detection| {
                detection.text = clean_text(&detection.text);
                (!detection.text.is_empty()).then_some(detection)
            })
            .collect();
        let read_count = readable.len();
        let detections = dedup_within_frame(readable);
        tally.duplicates_suppressed += (read_count - detections.len()) as u64;

        if detections.is_empty() {
            return;
        }

        let mut annotated: Option<RgbImage> = None;
        let mut written: HashSet<ArtifactKey> = HashSet::new();

        for detection in &detections {
            let verdict = self.filter.evaluate(&detection.text, now, run);
            if verdict.is_suppressed() {
                tally.duplicates_suppressed += 1;
                log_debug!("Frame {}: {} suppressed as duplicate", frame.index, detection.text);
                continue;
            }

            if verdict.reconcile {
                let outcome = self.reconciler.reconcile(&detection.text).await;
                tally.record(outcome);
            }

            if !verdict.persist {
                continue;
            }
            let key = self.naming.key_for(frame.index, detection);
            if !written.insert(key.clone()) {
                continue;
            }

            let image = annotated.get_or_insert_with(|| annotate(&frame.image, &detections));
            match self.persister.persist(image, &key) {
                Ok(path) => {
                    log_info!("Frame {}: saved {}", frame.index, path.display());
                    tally.artifacts.push(path);
                }
                Err(err) => {
                    log_warn!("Frame {}: artifact not saved: {err:#}", frame.index);
                    tally.artifact_failures += 1;
                }
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_become(next),
            "illegal run state change {:?} -> {:?}",
            self.state,
            next
        );
        log_debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
