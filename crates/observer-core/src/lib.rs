#![forbid(unsafe_code)]

//! **observer-core** – the Orchestrator: drives the Watcher/Detector pair
//! over an advancing block window, cross-checks the Detector's root
//! against the Buffer's, and fans the resulting state stream out through
//! the Recorder into the Categorizer.
//!
//! Grounded on `core/observer.go`'s `Observer.Observe` and
//! `integrations/protocols/privacy-pool/cmd/srv/observer.go`'s `Observe`
//! function: one window-driver task advances the chain window and feeds
//! the Detector, a second consumer task drains the Buffer's state stream
//! through the Recorder and Categorizer. The two tasks synchronise only
//! through the Buffer's rendezvous channel — there is no shared mutable
//! state between them beyond that handoff.

use std::sync::Arc;
use std::time::Duration;

use observer_buffer::Buffer;
use observer_categorizer::Categorizer;
use observer_chain::{ChainError, ChainRpc};
use observer_detector::{Detector, DetectorError};
use observer_recorder::{Recorder, RecorderError};
use observer_types::{CodecError, Hash32, RecordError};
use observer_watcher::{Observable, Watcher, WatcherError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors raised by [`Orchestrator::observe`]. Any variant here is fatal:
/// the observe loop stops and the caller decides whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The chain backend call failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// The Watcher failed to collect a window's states.
    #[error(transparent)]
    Watcher(#[from] WatcherError),
    /// The Detector rejected a batch or its Buffer stash failed.
    #[error(transparent)]
    Detector(#[from] DetectorError),
    /// The Recorder failed to build a delta.
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    /// A state payload from the Buffer's stream failed to decode.
    #[error(transparent)]
    Decode(#[from] CodecError),
    /// A Record failed to serialize before reaching the Categorizer.
    #[error(transparent)]
    RecordEncode(#[from] RecordError),
    /// The Detector's root diverged from the Buffer's root after a
    /// successful absorb — indicates a concurrent purge or an accumulator
    /// bug, and is always fatal.
    #[error("root mismatch: detector computed {detector_root:?}, buffer holds {buffer_root:?}")]
    RootMismatch {
        /// The root the Detector returned from `absorb`.
        detector_root: Hash32,
        /// The root read back from the Buffer immediately after.
        buffer_root: Hash32,
    },
    /// A pipeline task panicked or was aborted.
    #[error("pipeline task failed to join: {0}")]
    JoinFailed(#[from] tokio::task::JoinError),
}

/// Parameters for one [`Orchestrator::observe`] run.
#[derive(Debug, Clone, Copy)]
pub struct ObserveParams {
    /// The first block of the first window.
    pub start_block: u64,
    /// The maximum number of blocks covered by one window.
    pub max_window: u64,
    /// How long to sleep when the chain tip has not advanced past the
    /// window's lower bound.
    pub wait: Duration,
}

/// Drives one [`Observable`] end-to-end: window advancement, validation,
/// accumulation, and downstream risk-scoring.
#[derive(Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Creates a new, stateless Orchestrator.
    pub fn new() -> Self {
        Orchestrator
    }

    /// Runs the pipeline for `observable` until `cancel` is triggered or a
    /// fatal error occurs. Spawns three tasks — window-driver, Buffer sink
    /// republisher, and Recorder/Categorizer consumer — and does not
    /// return until all three have stopped.
    pub async fn observe(
        &self,
        observable: Arc<dyn Observable>,
        backend: Arc<dyn ChainRpc>,
        categorizer: Arc<dyn Categorizer>,
        params: ObserveParams,
        cancel: CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let buffer = Buffer::new(Hash32::ZERO);
        let detector = Detector::new(buffer.clone());
        let watcher = Watcher::new();

        let (state_tx, state_rx) = mpsc::channel(1);

        let sink_buffer = buffer.clone();
        let sink_handle = tokio::spawn(async move { sink_buffer.sink(state_tx).await });

        let driver_handle = tokio::spawn(window_driver(
            Arc::clone(&observable),
            Arc::clone(&backend),
            buffer.clone(),
            detector,
            watcher,
            params,
            cancel.clone(),
        ));

        let consumer_handle = tokio::spawn(consumer(state_rx, observable, categorizer, cancel));

        drop(buffer);

        let driver_result = driver_handle.await?;
        let consumer_result = consumer_handle.await?;

        // The sink task blocks on its own receiver forever once the driver
        // has stopped issuing stashes (it holds its own sender, so the
        // channel never closes on its own) — idle, so aborting is lossless.
        sink_handle.abort();
        let _ = sink_handle.await;

        driver_result?;
        consumer_result?;
        Ok(())
    }
}

async fn window_driver(
    observable: Arc<dyn Observable>,
    backend: Arc<dyn ChainRpc>,
    buffer: Buffer,
    mut detector: Detector,
    watcher: Watcher,
    params: ObserveParams,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let mut lo = params.start_block;
    loop {
        if cancel.is_cancelled() {
            debug!(id = observable.id(), "window driver: cancellation requested, stopping");
            return Ok(());
        }

        let latest = backend.block_number().await?;
        if latest == lo {
            tokio::select! {
                _ = tokio::time::sleep(params.wait) => {}
                _ = cancel.cancelled() => {
                    debug!(id = observable.id(), "window driver: cancelled while waiting for tip");
                    return Ok(());
                }
            }
            continue;
        }

        let hi = latest.min(lo + params.max_window);
        let batch = watcher.watch(observable.as_ref(), backend.as_ref(), lo, hi).await?;
        if batch.is_empty() {
            lo = hi;
            continue;
        }

        let observed = batch.len();
        let detector_root = detector.absorb(batch).await?;
        let buffer_root = buffer.root().await;
        if detector_root != buffer_root {
            return Err(OrchestratorError::RootMismatch {
                detector_root,
                buffer_root,
            });
        }
        info!(id = observable.id(), lo, hi, observed, root = ?detector_root, "window absorbed");
        lo = hi;
    }
}

async fn consumer(
    mut rx: mpsc::Receiver<Vec<u8>>,
    observable: Arc<dyn Observable>,
    categorizer: Arc<dyn Categorizer>,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let mut recorder = Recorder::new();
    loop {
        let payload = tokio::select! {
            item = rx.recv() => item,
            _ = cancel.cancelled() => {
                debug!(id = observable.id(), "consumer: cancellation requested, stopping");
                return Ok(());
            }
        };
        let Some(payload) = payload else {
            debug!(id = observable.id(), "consumer: state stream closed, stopping");
            return Ok(());
        };

        let state = observable.deserialize(&payload)?;
        if let Some(record) = recorder.record(state)? {
            let bytes = record.serialize()?;
            match categorizer.categorize(&bytes).await {
                Ok(result) => info!(
                    id = observable.id(),
                    blocked = result.blocked,
                    category = ?result.category_name,
                    "record categorized"
                ),
                Err(e) => warn!(id = observable.id(), error = %e, "categorizer request failed, continuing"),
            }
        }
    }
}
