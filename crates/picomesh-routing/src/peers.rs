//! Peer scoring and bounded active-set selection
//!
//! Once per discovery cycle the selector turns the raw scan results into a
//! fresh active peer set. Scores are recomputed from scratch every cycle:
//! signal quality plus an affinity bonus for every message-log record the
//! candidate appears in. Nothing carries over between cycles.

use picomesh_protocol::NodeAddress;

use crate::message_log::MessageLog;
use crate::AFFINITY_BONUS;

/// A peer reported by discovery, before affinity adjustment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCandidate {
    /// Candidate's link-layer address
    pub address: NodeAddress,

    /// Raw signal-derived score
    pub quality: i16,

    /// Beacon name announced by the candidate, when discovery provides one
    pub beacon: Option<String>,
}

impl PeerCandidate {
    /// Create a candidate with a known quality score
    pub fn new(address: NodeAddress, quality: i16) -> Self {
        PeerCandidate {
            address,
            quality,
            beacon: None,
        }
    }

    /// Derive quality from a received signal strength indication
    ///
    /// A stronger signal (rssi closer to zero) yields a higher quality.
    pub fn from_rssi(address: NodeAddress, rssi: i16) -> Self {
        Self::new(address, 128i16.saturating_sub(rssi.saturating_abs()))
    }

    /// Attach the beacon name seen during discovery
    pub fn with_beacon(mut self, beacon: impl Into<String>) -> Self {
        self.beacon = Some(beacon.into());
        self
    }
}

/// An active peer with its per-cycle score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub address: NodeAddress,
    pub score: i16,
}

/// Bounded set of currently active peers
///
/// Rebuilt from scratch on every discovery cycle and mirrored into the
/// transport's link table by the node. A score above zero is required for
/// membership.
#[derive(Debug, Clone)]
pub struct ActivePeerSet {
    peers: Vec<Peer>,
    capacity: usize,
}

impl ActivePeerSet {
    /// Create an empty set with the given capacity
    pub fn new(capacity: usize) -> Self {
        ActivePeerSet {
            peers: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of active peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Maximum number of peers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check membership by address
    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.peers.iter().any(|p| p.address == *address)
    }

    /// The active peers, in slot order
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Iterate member addresses
    pub fn addresses(&self) -> impl Iterator<Item = NodeAddress> + '_ {
        self.peers.iter().map(|p| p.address)
    }

    /// Lowest score currently held, if any
    pub fn min_score(&self) -> Option<i16> {
        self.peers.iter().map(|p| p.score).min()
    }

    /// Offer a scored peer to the set (online greedy top-M)
    ///
    /// Placement rules, in order: a non-positive score is never active and
    /// is discarded; an empty slot takes the peer; otherwise the peer
    /// replaces the current minimum-scoring entry if it strictly out-scores
    /// it, and is discarded if it does not. Returns whether the peer was
    /// placed.
    pub fn offer(&mut self, peer: Peer) -> bool {
        if peer.score <= 0 {
            return false;
        }

        if self.peers.len() < self.capacity {
            self.peers.push(peer);
            return true;
        }

        let weakest = self
            .peers
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.score)
            .map(|(i, p)| (i, p.score));

        match weakest {
            Some((index, score)) if peer.score > score => {
                self.peers[index] = peer;
                true
            }
            _ => false,
        }
    }
}

/// Builds a fresh active peer set from discovery results
#[derive(Debug, Clone)]
pub struct PeerSelector {
    max_peers: usize,
}

impl PeerSelector {
    /// Create a selector bounded to `max_peers` active peers
    pub fn new(max_peers: usize) -> Self {
        PeerSelector { max_peers }
    }

    /// Score the candidates against the message log and pick the active set
    ///
    /// Single pass in discovery order. Each candidate's score is its raw
    /// quality plus [`AFFINITY_BONUS`] for every log record it appears in
    /// as originator or sender, rewarding links that already carry
    /// traffic.
    pub fn select(&self, candidates: &[PeerCandidate], log: &MessageLog) -> ActivePeerSet {
        let mut set = ActivePeerSet::new(self.max_peers);

        for candidate in candidates {
            let affinity = (log.traffic_count(&candidate.address) as i16)
                .saturating_mul(AFFINITY_BONUS);
            let score = candidate.quality.saturating_add(affinity);
            let placed = set.offer(Peer {
                address: candidate.address,
                score,
            });
            log::trace!(
                "candidate {} quality {} affinity {} -> score {} ({})",
                candidate.address,
                candidate.quality,
                affinity,
                score,
                if placed { "kept" } else { "discarded" }
            );
        }

        set
    }
}
