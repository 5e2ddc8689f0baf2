//! Recency-ordered record of recently seen messages
//!
//! The log serves two purposes: loop prevention (a message already present
//! is a duplicate and must not be forwarded again) and single-hop
//! reverse-path inference (the peer that delivered traffic from a node is a
//! good relay toward that node).

use std::collections::VecDeque;

use picomesh_protocol::{MessageId, NodeAddress};

/// One observed message: we have seen (originator, id), delivered to us by
/// `sender`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRecord {
    /// Node that first created the message
    pub originator: NodeAddress,

    /// Peer that directly handed the message to us
    pub sender: NodeAddress,

    /// Per-originator message counter
    pub id: MessageId,
}

/// Bounded, newest-first log of seen messages
///
/// At most `capacity` records; no two records share an (originator, id)
/// pair. Insertion always places the new record at the front, evicting the
/// oldest when full. Recency-biased, not frequency-biased: the most
/// recently used route wins.
#[derive(Debug, Clone)]
pub struct MessageLog {
    /// Records, newest at the front
    records: VecDeque<MessageRecord>,

    capacity: usize,
}

impl MessageLog {
    /// Create an empty log with the given capacity
    pub fn new(capacity: usize) -> Self {
        MessageLog {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate records newest-first
    pub fn records(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    /// True iff a record with this (originator, id) exists anywhere in the
    /// log
    pub fn contains(&self, originator: &NodeAddress, id: MessageId) -> bool {
        self.records
            .iter()
            .any(|r| r.id == id && r.originator == *originator)
    }

    /// Record a newly received message
    ///
    /// Idempotent: a no-op when (originator, id) is already present.
    /// Otherwise inserts at the front, dropping the oldest record if the
    /// log was full. Returns whether a record was inserted.
    ///
    /// Called for every received frame that passes dedup, never for
    /// self-originated sends.
    pub fn record(&mut self, originator: NodeAddress, sender: NodeAddress, id: MessageId) -> bool {
        if self.contains(&originator, id) {
            return false;
        }

        if self.records.len() >= self.capacity {
            self.records.pop_back();
        }
        self.records.push_front(MessageRecord {
            originator,
            sender,
            id,
        });
        true
    }

    /// Infer a relay toward `target` from observed traffic
    ///
    /// Scans newest-first for a record whose originator or sender equals
    /// the target and returns that record's sender, provided the sender
    /// passes the active-peer filter. A match whose sender is no longer an
    /// active peer is skipped and the scan continues to older records; it
    /// is not a negative result.
    pub fn find_relay<F>(&self, target: &NodeAddress, is_active_peer: F) -> Option<NodeAddress>
    where
        F: Fn(&NodeAddress) -> bool,
    {
        self.records
            .iter()
            .filter(|r| r.originator == *target || r.sender == *target)
            .map(|r| r.sender)
            .find(|sender| is_active_peer(sender))
    }

    /// Number of records whose originator or sender equals `address`
    ///
    /// Peer selection uses this as the affinity measure for candidates
    /// that have recently carried traffic.
    pub fn traffic_count(&self, address: &NodeAddress) -> usize {
        self.records
            .iter()
            .filter(|r| r.originator == *address || r.sender == *address)
            .count()
    }
}
