#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Learned clause exchange between portfolio workers.
//!
//! Each worker owns a bounded inbox. Publishing sends an immutable copy of a
//! short learned clause to every peer's inbox without blocking: when an inbox
//! is full its oldest message is evicted to make room. Workers drain their
//! inbox at restart boundaries.

use crate::sat::clause::ClauseLiterals;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;

/// Default capacity of each worker's inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// A learned clause as published to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedClause {
    pub literals: ClauseLiterals,
    pub lbd: u32,
    /// Original clause ids the clause derives from.
    pub premises: Vec<u32>,
    /// Index of the publishing worker.
    pub origin: usize,
}

type Message = Arc<SharedClause>;

/// The set of inboxes for one portfolio run.
#[derive(Debug)]
pub struct ClauseExchange {
    inboxes: Vec<(Sender<Message>, Receiver<Message>)>,
}

impl ClauseExchange {
    #[must_use]
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            inboxes: (0..workers).map(|_| bounded(capacity.max(1))).collect(),
        }
    }

    /// The endpoint worker `worker` publishes and receives through.
    #[must_use]
    pub fn endpoint(&self, worker: usize) -> ExchangeEndpoint {
        let peers = self
            .inboxes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != worker)
            .map(|(_, (tx, rx))| (tx.clone(), rx.clone()))
            .collect();
        ExchangeEndpoint {
            worker,
            inbox: self.inboxes[worker].1.clone(),
            peers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeEndpoint {
    worker: usize,
    inbox: Receiver<Message>,
    /// Sender to each peer's inbox, with a receiver used only to evict the
    /// oldest message when that inbox is full.
    peers: Vec<(Sender<Message>, Receiver<Message>)>,
}

impl ExchangeEndpoint {
    #[must_use]
    pub const fn worker(&self) -> usize {
        self.worker
    }

    /// Sends `clause` to every peer. Returns the number of old messages
    /// evicted to make room.
    pub fn publish(&self, clause: SharedClause) -> usize {
        let message = Arc::new(clause);
        let mut evicted = 0;
        for (tx, rx) in &self.peers {
            let mut pending = Arc::clone(&message);
            loop {
                match tx.try_send(pending) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => break,
                    Err(TrySendError::Full(returned)) => {
                        if rx.try_recv().is_ok() {
                            evicted += 1;
                        }
                        pending = returned;
                    }
                }
            }
        }
        evicted
    }

    /// Takes every clause currently waiting in this worker's inbox.
    #[must_use]
    pub fn drain(&self) -> Vec<Arc<SharedClause>> {
        self.inbox.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Literal;
    use smallvec::smallvec;

    fn clause(tag: i32, origin: usize) -> SharedClause {
        SharedClause {
            literals: smallvec![Literal::from_i32(tag)],
            lbd: 1,
            premises: vec![],
            origin,
        }
    }

    #[test]
    fn test_publish_reaches_peers_only() {
        let exchange = ClauseExchange::new(3, 4);
        let a = exchange.endpoint(0);
        let b = exchange.endpoint(1);
        let c = exchange.endpoint(2);

        a.publish(clause(1, 0));
        assert!(a.drain().is_empty());
        assert_eq!(b.drain().len(), 1);
        let received = c.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].origin, 0);
    }

    #[test]
    fn test_full_inbox_drops_oldest() {
        let exchange = ClauseExchange::new(2, 2);
        let a = exchange.endpoint(0);
        let b = exchange.endpoint(1);

        assert_eq!(a.publish(clause(1, 0)), 0);
        assert_eq!(a.publish(clause(2, 0)), 0);
        assert_eq!(a.publish(clause(3, 0)), 1);

        let received: Vec<i32> = b.drain().iter().map(|c| c.literals[0].to_i32()).collect();
        assert_eq!(received, vec![2, 3]);
    }
}
