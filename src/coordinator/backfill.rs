//! Background backfill
//!
//! Runs `backfill` on a dedicated thread so commit latency never includes
//! the canonical copy. Requests arrive over a crossbeam channel; the worker
//! exits once every sender is gone and the queue is drained.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::error::{LakeError, Result};
use crate::logstore::Version;

use super::{BackfillOutcome, CommitCoordinatorClient};

#[derive(Debug)]
struct BackfillRequest {
    table_path: String,
    version: Version,
}

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub published: u64,
    pub already_present: u64,
    pub failed: u64,
}

pub struct BackfillWorker {
    sender: Option<Sender<BackfillRequest>>,
    handle: Option<JoinHandle<BackfillStats>>,
}

impl BackfillWorker {
    pub fn spawn(client: Arc<dyn CommitCoordinatorClient>) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<BackfillRequest>();

        let handle = thread::Builder::new()
            .name("lakelog-backfill".to_string())
            .spawn(move || {
                let mut stats = BackfillStats::default();
                for request in receiver {
                    match client.backfill(&request.table_path, request.version) {
                        Ok(BackfillOutcome::Published) => stats.published += 1,
                        Ok(BackfillOutcome::AlreadyPresent) => stats.already_present += 1,
                        Err(e) => {
                            stats.failed += 1;
                            if e.is_fatal_inconsistency() {
                                tracing::error!(
                                    "backfill {} version {}: {}",
                                    request.table_path,
                                    request.version,
                                    e
                                );
                            } else {
                                tracing::warn!(
                                    "backfill {} version {} failed: {}",
                                    request.table_path,
                                    request.version,
                                    e
                                );
                            }
                        }
                    }
                }
                stats
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue a backfill; never blocks
    pub fn submit(&self, table_path: &str, version: Version) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| LakeError::Transient("backfill worker stopped".to_string()))?;
        sender
            .send(BackfillRequest {
                table_path: table_path.to_string(),
                version,
            })
            .map_err(|_| LakeError::Transient("backfill worker stopped".to_string()))
    }

    /// Drain queued requests and stop
    pub fn shutdown(mut self) -> Result<BackfillStats> {
        self.stop()
    }

    fn stop(&mut self) -> Result<BackfillStats> {
        drop(self.sender.take());
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LakeError::Transient("backfill worker panicked".to_string())),
            None => Ok(BackfillStats::default()),
        }
    }
}

impl Drop for BackfillWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("{}", e);
        }
    }
}
