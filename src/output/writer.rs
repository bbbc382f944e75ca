use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, warn};

use crate::{
    error::RecordingError,
    pipeline::sinks::{FinalizeCallback, FinalizeStatus},
};

/// Bounded queue drained by a dedicated writer thread
///
/// Gives encoders their readiness signal: there is room as long as the queue
/// is not full and the writer has not failed.
pub(crate) struct BackgroundWriter<T> {
    tx: Option<mpsc::Sender<T>>,
    worker: Option<JoinHandle<io::Result<u64>>>,
    failed: Arc<AtomicBool>,
}

impl<T: Send + 'static> BackgroundWriter<T> {
    pub fn spawn<W>(name: &str, depth: usize, mut write: W) -> io::Result<Self>
    where
        W: FnMut(T) -> io::Result<()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<T>(depth.max(1));
        let failed = Arc::new(AtomicBool::new(false));
        let worker_failed = Arc::clone(&failed);

        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut written = 0u64;
                while let Some(item) = rx.blocking_recv() {
                    if let Err(e) = write(item) {
                        worker_failed.store(true, Ordering::Release);
                        error!("Writer failed after {} frames: {}", written, e);
                        return Err(e);
                    }
                    written += 1;
                }
                Ok(written)
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            failed,
        })
    }

    pub fn has_room(&self) -> bool {
        !self.failed.load(Ordering::Acquire)
            && self.tx.as_ref().is_some_and(|tx| tx.capacity() > 0)
    }

    pub fn push(&self, item: T) -> Result<(), RecordingError> {
        let tx = self.tx.as_ref().ok_or_else(|| RecordingError::AppendFailed {
            reason: "writer already finished".to_string(),
        })?;

        tx.try_send(item).map_err(|e| RecordingError::AppendFailed {
            reason: match e {
                TrySendError::Full(_) => "write queue full".to_string(),
                TrySendError::Closed(_) => "writer stopped".to_string(),
            },
        })
    }

    /// Close the queue and wait for everything queued to be written
    pub fn finish(&mut self) -> io::Result<u64> {
        drop(self.tx.take());
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "writer thread panicked"))),
            None => Ok(0),
        }
    }
}

/// Run an encoder's finalize work off the calling thread
///
/// If the thread cannot be started the callback is dropped unreported, which
/// the recording controller turns into a failed session.
pub(crate) fn spawn_finalize<F>(name: &str, on_complete: FinalizeCallback, work: F)
where
    F: FnOnce() -> FinalizeStatus + Send + 'static,
{
    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || on_complete(work()));

    if let Err(e) = spawned {
        warn!("Could not start {} thread: {}", name, e);
    }
}

pub(crate) fn finalize_failed(reason: impl Into<String>) -> FinalizeStatus {
    FinalizeStatus::Failed(RecordingError::FinalizeFailed { reason: reason.into() })
}
