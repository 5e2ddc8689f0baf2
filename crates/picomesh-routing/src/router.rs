//! Forwarding and routing decision logic
//!
//! The router is stateless per call: each decision is keyed off the frame
//! kind and the local address, consulting (and updating) the message log.
//! It produces decision values; executing them against the transport is the
//! node's job.

use log::{debug, trace};
use picomesh_protocol::{Frame, FrameKind, NodeAddress};

use crate::message_log::MessageLog;

/// How a frame leaves this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Send to a single peer that is believed to be on the path to the
    /// target
    Unicast(NodeAddress),

    /// Send to every active peer
    Flood,
}

/// Why an inbound frame was silently dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Our own message looping back to us
    SelfOrigin,

    /// (originator, id) already present in the log
    Duplicate,
}

/// Outcome of accepting an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Dropped without delivery or forwarding
    Drop(DropReason),

    /// Addressed to this node: deliver with `forwarded = false`, do not
    /// re-forward
    Deliver,

    /// This node is an intermediate relay: forward as indicated AND
    /// deliver with `forwarded = true`
    DeliverAndForward(Delivery),
}

/// Per-node routing state: the local identity and the message log
#[derive(Debug)]
pub struct Router {
    local: NodeAddress,
    log: MessageLog,
}

impl Router {
    /// Create a router for the node at `local`
    pub fn new(local: NodeAddress, log_capacity: usize) -> Self {
        Router {
            local,
            log: MessageLog::new(log_capacity),
        }
    }

    /// This node's address
    pub fn local(&self) -> NodeAddress {
        self.local
    }

    /// The message log (peer selection reads it for affinity scoring)
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Routing decision for a targeted frame, whether locally originated
    /// or relayed
    ///
    /// Prefers a unicast to a relay inferred from the log; falls back to
    /// flooding when no log entry matches the target or no matching sender
    /// is still an active peer.
    pub fn route_targeted<F>(&self, target: &NodeAddress, is_active_peer: F) -> Delivery
    where
        F: Fn(&NodeAddress) -> bool,
    {
        match self.log.find_relay(target, is_active_peer) {
            Some(relay) => {
                trace!("relay toward {} via {}", target, relay);
                Delivery::Unicast(relay)
            }
            None => {
                trace!("no known route toward {}, flooding", target);
                Delivery::Flood
            }
        }
    }

    /// Run the inbound pipeline for a decoded frame
    ///
    /// `sender` is the peer that physically delivered the frame, supplied
    /// by the transport. On acceptance the frame is recorded in the log;
    /// the caller executes the returned decision.
    pub fn accept<F>(&mut self, sender: NodeAddress, frame: &Frame, is_active_peer: F) -> Inbound
    where
        F: Fn(&NodeAddress) -> bool,
    {
        if frame.originator == self.local {
            trace!("own message {} looped back, dropping", frame.id);
            return Inbound::Drop(DropReason::SelfOrigin);
        }

        if self.log.contains(&frame.originator, frame.id) {
            debug!(
                "duplicate message ({}, {}), dropping",
                frame.originator, frame.id
            );
            return Inbound::Drop(DropReason::Duplicate);
        }

        self.log.record(frame.originator, sender, frame.id);

        if frame.target == Some(self.local) {
            return Inbound::Deliver;
        }

        let delivery = match frame.kind {
            FrameKind::Broadcast => Delivery::Flood,
            // The codec never yields a targeted frame without a target;
            // a bare one floods like the degenerate zero-target case.
            FrameKind::Targeted => match &frame.target {
                Some(target) => self.route_targeted(target, is_active_peer),
                None => Delivery::Flood,
            },
        };

        Inbound::DeliverAndForward(delivery)
    }
}
