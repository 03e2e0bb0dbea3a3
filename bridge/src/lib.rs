//! Cross-boundary queue bridge.
//!
//! Producers run as tokio tasks and publish raw course URLs through a
//! cloneable [`Publisher`]. A relay task parses and deduplicates them, then
//! forwards [`SpecificCourse`] values over a blocking channel to the single
//! [`Consumer`] owned by the enrollment worker thread.
//!
//! The bridge never decides when producers are done. The caller joins its
//! producers, then calls [`Bridge::close`], which injects the end-of-stream
//! sentinel and waits for the relay to drain.

mod relay;

use std::sync::{Arc, PoisonError, RwLock, mpsc as blocking};

use autocoupons_types::{CourseStore, SpecificCourse};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::relay::Inbound;
pub use crate::relay::RelayStats;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("publish after the bridge was closed")]
    Closed,
    #[error("bridge relay task panicked")]
    RelayPanicked,
}

/// An item delivered to the worker side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Course(SpecificCourse),
    /// End of stream. Delivered exactly once, after every course.
    End,
}

type SharedSender = Arc<RwLock<Option<mpsc::UnboundedSender<Inbound>>>>;

/// Producer-side handle. Clone one per producer task.
#[derive(Clone)]
pub struct Publisher {
    tx: SharedSender,
}

impl Publisher {
    /// Queue a raw course URL for relay. Never waits on the consumer.
    pub fn publish(&self, url: impl Into<String>) -> Result<(), BridgeError> {
        let guard = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(BridgeError::Closed)?;
        tx.send(Inbound::Url(url.into()))
            .map_err(|_| BridgeError::Closed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Worker-side handle. Blocks the calling thread; do not use from async code.
pub struct Consumer {
    rx: blocking::Receiver<QueueItem>,
    finished: bool,
}

impl Consumer {
    /// Wait for the next course or the sentinel.
    ///
    /// Once the sentinel has been returned, every further call returns
    /// [`QueueItem::End`] without blocking.
    pub fn recv(&mut self) -> QueueItem {
        if self.finished {
            return QueueItem::End;
        }
        match self.rx.recv() {
            Ok(QueueItem::Course(course)) => QueueItem::Course(course),
            Ok(QueueItem::End) => {
                self.finished = true;
                QueueItem::End
            }
            Err(_) => {
                tracing::error!("Bridge relay went away without sending end of stream");
                self.finished = true;
                QueueItem::End
            }
        }
    }
}

impl Iterator for Consumer {
    type Item = SpecificCourse;

    fn next(&mut self) -> Option<Self::Item> {
        match self.recv() {
            QueueItem::Course(course) => Some(course),
            QueueItem::End => None,
        }
    }
}

/// Owner of the relay task and the close operation.
pub struct Bridge {
    tx: SharedSender,
    relay: JoinHandle<RelayStats>,
}

impl Bridge {
    /// Open the bridge and spawn its relay task on the current tokio runtime.
    ///
    /// `known` is the store as loaded at startup. Courses it already contains
    /// are filtered out by the relay and never reach the consumer.
    #[must_use]
    pub fn open(known: Arc<CourseStore>) -> (Self, Consumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = blocking::channel();
        let relay = tokio::spawn(relay::run(rx, out_tx, known));

        let bridge = Self {
            tx: Arc::new(RwLock::new(Some(tx))),
            relay,
        };
        let consumer = Consumer {
            rx: out_rx,
            finished: false,
        };
        (bridge, consumer)
    }

    #[must_use]
    pub fn publisher(&self) -> Publisher {
        Publisher {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Inject the sentinel and wait for the relay to finish.
    ///
    /// Every URL published before this call is relayed first. Publishing
    /// afterwards fails with [`BridgeError::Closed`].
    pub async fn close(self) -> Result<RelayStats, BridgeError> {
        let sender = self
            .tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender
            && sender.send(Inbound::Close).is_err()
        {
            tracing::warn!("Bridge relay stopped before the sentinel was sent");
        }

        match self.relay.await {
            Ok(stats) => Ok(stats),
            Err(err) => {
                tracing::error!(error = %err, "Bridge relay task failed");
                Err(BridgeError::RelayPanicked)
            }
        }
    }
}
