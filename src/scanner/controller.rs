use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{Orchestrator, RunError, RunReport};
use super::source::{SourceOpener, SourceSelector};

/// A run that has left the background task, handing the orchestrator back
/// so its dedup cache can serve the next run.
pub struct FinishedScan {
    pub orchestrator: Orchestrator,
    pub result: Result<RunReport, RunError>,
}

type ScanTask = JoinHandle<FinishedScan>;

/// Runs one scan at a time on a background task with an external stop.
#[derive(Default)]
pub struct ScanController {
    handle: Option<ScanTask>,
    cancel_token: Option<CancellationToken>,
}

impl ScanController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn `orchestrator` over `selector`. Returns the token that stops it.
    pub fn start(
        &mut self,
        mut orchestrator: Orchestrator,
        selector: SourceSelector,
        opener: Arc<dyn SourceOpener>,
    ) -> Result<CancellationToken> {
        if self.handle.is_some() {
            bail!("scan already active");
        }

        let cancel_token = orchestrator.rearm();
        info!("Starting background scan of {selector}");

        let handle = tokio::spawn(async move {
            let result = orchestrator.process(&selector, opener.as_ref()).await;
            FinishedScan {
                orchestrator,
                result,
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token.clone());
        Ok(cancel_token)
    }

    /// Ask the run to stop after its current frame and wait for it.
    pub async fn stop(&mut self) -> Result<Option<FinishedScan>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
            info!("Stop signal sent to scan loop");
        }
        self.join().await
    }

    /// Wait for the run to end on its own.
    pub async fn wait(&mut self) -> Result<Option<FinishedScan>> {
        self.join().await
    }

    async fn join(&mut self) -> Result<Option<FinishedScan>> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("scan loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }
}
