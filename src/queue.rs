//! Handoff queue between a runner and whoever consumes its datapoints.
//!
//! A bounded FIFO: the producer blocks when it is full, so a slow consumer
//! slows sampling instead of losing data. End of stream is a dedicated
//! variant on the channel, sent once after the last datapoint.

use std::{
    sync::{
        Arc,
        atomic::{AtomicIsize, Ordering},
    },
    time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::encode::Encoded;
use crate::error::{ObserverError, Result};

/// What travels on the channel.
#[derive(Debug)]
enum Feed {
    Datapoint(Encoded),
    End,
}

/// Create a queue holding at most `capacity` undelivered datapoints.
///
/// A capacity of zero makes every `put` wait for a consumer to take it.
pub fn handoff(capacity: usize) -> (Producer, Consumer) {
    let (tx, rx) = channel::bounded(capacity);
    let depth = QueueDepth::default();
    (
        Producer {
            tx,
            depth: depth.clone(),
        },
        Consumer {
            rx,
            ended: false,
            depth,
        },
    )
}

/// Datapoints queued but not yet taken.
///
/// Readable without holding either end of the queue, so it stays valid
/// after the producer is gone. A `put` still blocked on a full queue is
/// not counted.
#[derive(Debug, Clone, Default)]
pub struct QueueDepth(Arc<AtomicIsize>);

impl QueueDepth {
    pub fn get(&self) -> usize {
        usize::try_from(self.0.load(Ordering::Acquire)).unwrap_or(0)
    }

    fn added(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    // A consumer may take an item before its `put` has counted it, so the
    // counter can dip below zero for a moment.
    fn taken(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Sending half, owned by a runner.
///
/// Once every producer is dropped, consumers that never saw the end
/// marker see the stream end.
#[derive(Debug, Clone)]
pub struct Producer {
    tx: Sender<Feed>,
    depth: QueueDepth,
}

impl Producer {
    /// Enqueue a datapoint, blocking while the queue is full.
    pub fn put(&self, item: Encoded) -> Result<()> {
        self.tx
            .send(Feed::Datapoint(item))
            .map_err(|_| ObserverError::QueueClosed)?;
        self.depth.added();
        Ok(())
    }

    /// Enqueue the end-of-stream marker.
    pub(crate) fn end(&self) -> Result<()> {
        self.tx.send(Feed::End).map_err(|_| ObserverError::QueueClosed)
    }

    /// Datapoints waiting to be consumed.
    pub fn len(&self) -> usize {
        self.depth.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// Result of a non-blocking or timed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// A datapoint was waiting.
    Ready(Encoded),

    /// Nothing yet; the producer is still running.
    Empty,

    /// The producer has finished. No more datapoints will arrive.
    Ended,
}

/// Receiving half.
///
/// With several consumers on one queue, only the one that takes the end
/// marker sees [`Poll::Ended`] straight away; the rest see it once the
/// producer is dropped, which a runner does as soon as it stops.
#[derive(Debug, Clone)]
pub struct Consumer {
    rx: Receiver<Feed>,
    ended: bool,
    depth: QueueDepth,
}

impl Consumer {
    /// Block until the next datapoint; `None` once the stream has ended.
    pub fn recv(&mut self) -> Option<Encoded> {
        if self.ended {
            return None;
        }
        match self.rx.recv() {
            Ok(Feed::Datapoint(item)) => {
                self.depth.taken();
                Some(item)
            }
            Ok(Feed::End) | Err(_) => {
                self.ended = true;
                None
            }
        }
    }

    /// Wait up to `timeout` for the next datapoint.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Poll {
        if self.ended {
            return Poll::Ended;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(feed) => self.accept(feed),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => {
                self.ended = true;
                Poll::Ended
            }
        }
    }

    /// Take the next datapoint if one is waiting.
    pub fn try_recv(&mut self) -> Poll {
        if self.ended {
            return Poll::Ended;
        }
        match self.rx.try_recv() {
            Ok(feed) => self.accept(feed),
            Err(TryRecvError::Empty) => Poll::Empty,
            Err(TryRecvError::Disconnected) => {
                self.ended = true;
                Poll::Ended
            }
        }
    }

    /// Take everything currently queued without blocking.
    pub fn drain(&mut self) -> Vec<Encoded> {
        let mut items = Vec::new();
        while let Poll::Ready(item) = self.try_recv() {
            items.push(item);
        }
        items
    }

    /// Whether this consumer has seen the end of the stream.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Datapoints waiting, not counting the end marker.
    pub fn len(&self) -> usize {
        self.depth.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn accept(&mut self, feed: Feed) -> Poll {
        match feed {
            Feed::Datapoint(item) => {
                self.depth.taken();
                Poll::Ready(item)
            }
            Feed::End => {
                self.ended = true;
                Poll::Ended
            }
        }
    }
}

impl Iterator for Consumer {
    type Item = Encoded;

    fn next(&mut self) -> Option<Encoded> {
        self.recv()
    }
}
