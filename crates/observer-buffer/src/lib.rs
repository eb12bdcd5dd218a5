#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **observer-buffer** – the concurrent Poseidon accumulator.
//!
//! The Buffer accepts serialized [`observer_types::State`] payloads one at a
//! time from the Detector, folds each into a running Poseidon root, and
//! republishes the raw bytes to a downstream sink over an unbuffered
//! rendezvous channel — backpressuring the Detector until the sink consumer
//! has taken the previous payload.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use observer_types::{poseidon2, poseidon_hash_bytes, Hash32, PoseidonError};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, trace};

/// Errors raised by [`Buffer::stash`].
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// The Poseidon accumulator fold failed; the payload was not committed.
    #[error("accumulator fold failed: {0}")]
    Accumulator(#[from] PoseidonError),
    /// `stash` was called while a `purge` is in progress.
    #[error("buffer is being purged")]
    Purged,
    /// The sink consumer task is gone; no one will ever receive this payload.
    #[error("sink channel closed")]
    SinkClosed,
}

#[derive(Debug, Clone, Copy)]
struct State {
    root: Hash32,
    count: u64,
}

struct Parcel {
    payload: Vec<u8>,
    ack: oneshot::Sender<()>,
}

/// The concurrent accumulator + stash-channel sink.
///
/// Clone is cheap (all fields are `Arc`-backed); every clone refers to the
/// same underlying accumulator and channel.
#[derive(Clone)]
pub struct Buffer {
    state: Arc<RwLock<State>>,
    purging: Arc<AtomicBool>,
    pending: Arc<AtomicU64>,
    tx: mpsc::Sender<Parcel>,
    rx: Arc<Mutex<mpsc::Receiver<Parcel>>>,
}

impl Buffer {
    /// Creates a new buffer with the given initial root (typically zero).
    pub fn new(initial_root: Hash32) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Buffer {
            state: Arc::new(RwLock::new(State {
                root: initial_root,
                count: 0,
            })),
            purging: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicU64::new(0)),
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Hashes `payload`, folds it into the running root, publishes it to the
    /// sink, and returns the updated root. Blocks until the sink consumer
    /// has received the payload (the synchronous-rendezvous back-pressure
    /// contract).
    pub async fn stash(&self, payload: Vec<u8>) -> Result<Hash32, BufferError> {
        if self.purging.load(Ordering::Acquire) {
            return Err(BufferError::Purged);
        }

        let h = poseidon_hash_bytes(&payload)?;
        let new_root = {
            let guard = self.state.read().await;
            poseidon2(&h, &guard.root)?
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::AcqRel);
        let send_result = self.tx.send(Parcel { payload, ack: ack_tx }).await;
        if send_result.is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(BufferError::SinkClosed);
        }
        let ack_result = ack_rx.await;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if ack_result.is_err() {
            return Err(BufferError::SinkClosed);
        }

        let mut guard = self.state.write().await;
        if self.purging.load(Ordering::Acquire) {
            return Err(BufferError::Purged);
        }
        guard.root = new_root;
        guard.count += 1;
        trace!(count = guard.count, "stash committed");
        Ok(new_root)
    }

    /// Consumes the internal stash channel and forwards payloads to `out`,
    /// one at a time, acknowledging each so the matching [`Buffer::stash`]
    /// call returns. Runs until the buffer is purged or every `stash`-side
    /// sender is dropped.
    pub async fn sink(&self, out: mpsc::Sender<Vec<u8>>) {
        loop {
            let parcel = {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            };
            match parcel {
                Some(parcel) => {
                    if out.send(parcel.payload).await.is_err() {
                        let _ = parcel.ack.send(());
                        debug!("buffer sink: downstream consumer gone, stopping");
                        return;
                    }
                    let _ = parcel.ack.send(());
                }
                None => {
                    debug!("buffer sink: stash channel closed, stopping");
                    return;
                }
            }
        }
    }

    /// The current accumulator root.
    pub async fn root(&self) -> Hash32 {
        self.state.read().await.root
    }

    /// The number of payloads successfully stashed since the last purge.
    pub async fn count(&self) -> u64 {
        self.state.read().await.count
    }

    /// The number of payloads sent to the sink but not yet acknowledged.
    pub fn size(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    /// Drains any undelivered payloads, resets the counter to zero and the
    /// root to the empty sentinel. Returns `false` if the buffer was
    /// already empty. Safe against concurrent `stash`/`sink` calls: `stash`
    /// is rejected for the duration.
    pub async fn purge(&self) -> bool {
        self.purging.store(true, Ordering::Release);
        let mut guard = self.state.write().await;

        let mut drained = false;
        {
            let mut rx = self.rx.lock().await;
            while let Ok(parcel) = rx.try_recv() {
                let _ = parcel.ack.send(());
                drained = true;
            }
        }

        let was_empty = guard.count == 0 && !drained;
        guard.root = Hash32::ZERO;
        guard.count = 0;
        self.pending.store(0, Ordering::Release);
        self.purging.store(false, Ordering::Release);
        !was_empty
    }
}
