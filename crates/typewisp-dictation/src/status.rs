//! Status publication.
//!
//! The orchestrator is the only publisher. Front-ends either subscribe to
//! the ordered stream of transitions or poll the latest value.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use typewisp_core::types::StatusSignal;

const STATUS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub(crate) struct StatusPublisher {
    stream: broadcast::Sender<StatusSignal>,
    latest: watch::Sender<StatusSignal>,
}

impl StatusPublisher {
    pub(crate) fn new() -> Self {
        let (stream, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (latest, _) = watch::channel(StatusSignal::Ready);
        Self { stream, latest }
    }

    pub(crate) fn publish(&self, signal: StatusSignal) {
        tracing::debug!(status = %signal, "Status");
        self.latest.send_replace(signal.clone());
        // No subscribers is fine.
        let _ = self.stream.send(signal);
    }

    pub(crate) fn reader(&self) -> StatusReader {
        StatusReader {
            stream: self.stream.clone(),
            latest: self.latest.subscribe(),
        }
    }
}

/// Read side of the status channel, held by [`crate::OrchestratorHandle`].
#[derive(Debug, Clone)]
pub struct StatusReader {
    stream: broadcast::Sender<StatusSignal>,
    latest: watch::Receiver<StatusSignal>,
}

impl StatusReader {
    pub fn subscribe(&self) -> StatusStream {
        StatusStream {
            rx: self.stream.subscribe(),
        }
    }

    pub fn current(&self) -> StatusSignal {
        self.latest.borrow().clone()
    }
}

/// Ordered stream of status transitions.
#[derive(Debug)]
pub struct StatusStream {
    rx: broadcast::Receiver<StatusSignal>,
}

impl StatusStream {
    /// Next transition, or `None` once the orchestrator is gone.
    ///
    /// A subscriber that falls behind skips the transitions it missed.
    pub async fn next(&mut self) -> Option<StatusSignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Status subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
