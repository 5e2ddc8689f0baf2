//! Mesh node orchestration
//!
//! `MeshNode` wires the frame codec, the router and the peer selector to
//! the host's transport and discovery collaborators. All logic runs inside
//! the handler methods the host invokes; the host serializes them, so no
//! locking happens here.

use log::{debug, warn};
use tokio::sync::mpsc;

use picomesh_protocol::{Frame, MessageId, NodeAddress};
use picomesh_routing::{Delivery, Inbound, MessageLog, PeerCandidate, PeerSelector, Router};

use crate::config::NodeConfig;
use crate::error::Result;
use crate::transport::{Discovery, NullWatchdog, SendStatus, Transport, Watchdog};

/// Events delivered to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A message reached this node
    Received {
        /// Application payload, exactly as the originator sent it
        payload: Vec<u8>,
        /// True when this node relayed the message onward (it was not the
        /// final recipient)
        forwarded: bool,
        /// The node that created the message
        originator: NodeAddress,
    },

    /// The transport finished a transmission
    SendComplete(SendStatus),
}

/// A running mesh node
pub struct MeshNode<T: Transport, D: Discovery> {
    config: NodeConfig,
    router: Router,
    selector: PeerSelector,
    /// Incremented before each locally-originated send; wraps at 16 bits
    next_id: MessageId,
    transport: T,
    discovery: D,
    watchdog: Box<dyn Watchdog>,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl<T: Transport, D: Discovery> MeshNode<T, D> {
    /// Create a node and the receiving end of its application event
    /// channel
    pub fn new(
        config: NodeConfig,
        transport: T,
        discovery: D,
    ) -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let node = MeshNode {
            router: Router::new(config.address, config.log_capacity),
            selector: PeerSelector::new(config.max_peers),
            next_id: MessageId::default(),
            config,
            transport,
            discovery,
            watchdog: Box::new(NullWatchdog),
            events,
        };
        (node, rx)
    }

    /// Replace the liveness hook
    pub fn with_watchdog(mut self, watchdog: Box<dyn Watchdog>) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// This node's address
    pub fn address(&self) -> NodeAddress {
        self.config.address
    }

    /// The message log (read-only)
    pub fn message_log(&self) -> &MessageLog {
        self.router.log()
    }

    /// The transport collaborator
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Originate a broadcast message to every reachable node
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let id = self.allocate_id();
        let frame = Frame::broadcast(self.config.address, id, payload.to_vec());
        let bytes = frame.encode()?;
        // Own sends are never recorded in the log.
        self.transmit(Delivery::Flood, &bytes).await
    }

    /// Originate a message addressed to one specific node
    ///
    /// Unicast to a relay learned from observed traffic when one exists,
    /// flood fallback otherwise.
    pub async fn send_to(&mut self, payload: &[u8], target: NodeAddress) -> Result<()> {
        let id = self.allocate_id();
        let frame = Frame::targeted(self.config.address, target, id, payload.to_vec());
        let bytes = frame.encode()?;

        let transport = &self.transport;
        let delivery = self
            .router
            .route_targeted(&target, |peer| transport.link_exists(peer));
        self.transmit(delivery, &bytes).await
    }

    /// Process a raw frame handed up by the transport
    ///
    /// `sender` is the peer that physically delivered it. Malformed frames
    /// and duplicates are dropped silently; the application only ever sees
    /// messages that passed the full pipeline.
    pub async fn handle_frame(&mut self, sender: NodeAddress, bytes: &[u8]) -> Result<()> {
        self.watchdog.feed();

        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("malformed frame from {}: {}", sender, e);
                return Ok(());
            }
        };

        let transport = &self.transport;
        let outcome = self
            .router
            .accept(sender, &frame, |peer| transport.link_exists(peer));

        match outcome {
            Inbound::Drop(_) => Ok(()),
            Inbound::Deliver => {
                self.emit_received(&frame, false);
                Ok(())
            }
            Inbound::DeliverAndForward(delivery) => {
                // Re-encode with the original originator and id, never a
                // fresh one.
                let bytes = frame.encode()?;
                // Forwarding is best-effort: a transport failure must not
                // suppress local delivery, and no retry happens here.
                if let Err(e) = self.transmit(delivery, &bytes).await {
                    warn!("forward of message {} failed: {}", frame.id, e);
                }
                self.emit_received(&frame, true);
                Ok(())
            }
        }
    }

    /// Kick off a peer scan; call this periodically
    ///
    /// Results arrive later through
    /// [`handle_discovery_complete`](Self::handle_discovery_complete).
    pub async fn scan_for_peers(&mut self) -> Result<()> {
        self.discovery.start_scan().await
    }

    /// Process the candidate list from a completed scan
    ///
    /// Rebuilds the active peer set from scratch and reconciles the
    /// transport's link table with it.
    pub fn handle_discovery_complete(&mut self, candidates: Vec<PeerCandidate>) -> Result<()> {
        self.watchdog.feed();

        let candidates: Vec<PeerCandidate> = candidates
            .into_iter()
            .filter(|c| self.beacon_matches(c))
            .collect();
        let active = self.selector.select(&candidates, self.router.log());

        self.watchdog.feed();

        for address in active.addresses() {
            if !self.transport.link_exists(&address) {
                self.transport.add_link(address)?;
            }
        }
        for link in self.transport.links() {
            if !active.contains(&link) {
                self.transport.remove_link(&link)?;
            }
        }

        debug!("discovery cycle complete, {} active peers", active.len());
        Ok(())
    }

    /// Relay a transmission completion from the transport to the
    /// application
    pub fn handle_send_complete(&mut self, status: SendStatus) {
        self.emit(NodeEvent::SendComplete(status));
    }

    fn beacon_matches(&self, candidate: &PeerCandidate) -> bool {
        match (&candidate.beacon, &self.config.beacon_prefix) {
            (Some(beacon), Some(prefix)) => beacon.starts_with(prefix.as_str()),
            _ => true,
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id = self.next_id.next();
        self.next_id
    }

    async fn transmit(&self, delivery: Delivery, bytes: &[u8]) -> Result<()> {
        self.watchdog.feed();
        match delivery {
            Delivery::Unicast(peer) => self.transport.send_unicast(&peer, bytes).await,
            Delivery::Flood => self.transport.send_broadcast(bytes).await,
        }
    }

    fn emit_received(&self, frame: &Frame, forwarded: bool) {
        self.emit(NodeEvent::Received {
            payload: frame.payload.clone(),
            forwarded,
            originator: frame.originator,
        });
    }

    fn emit(&self, event: NodeEvent) {
        if self.events.send(event).is_err() {
            warn!("application event channel closed, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn addr(byte: u8) -> NodeAddress {
        NodeAddress::from_bytes([byte; 6])
    }

    /// Records every transmission instead of sending it anywhere
    #[derive(Default)]
    struct RecordingTransport {
        links: Vec<NodeAddress>,
        unicasts: Arc<Mutex<Vec<(NodeAddress, Vec<u8>)>>>,
        broadcasts: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_unicast(&self, peer: &NodeAddress, bytes: &[u8]) -> Result<()> {
            self.unicasts.lock().unwrap().push((*peer, bytes.to_vec()));
            Ok(())
        }

        async fn send_broadcast(&self, bytes: &[u8]) -> Result<()> {
            self.broadcasts.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        fn link_exists(&self, address: &NodeAddress) -> bool {
            self.links.contains(address)
        }

        fn add_link(&mut self, address: NodeAddress) -> Result<()> {
            self.links.push(address);
            Ok(())
        }

        fn remove_link(&mut self, address: &NodeAddress) -> Result<()> {
            self.links.retain(|l| l != address);
            Ok(())
        }

        fn links(&self) -> Vec<NodeAddress> {
            self.links.clone()
        }
    }

    /// Accepts link management but fails every transmission
    #[derive(Default)]
    struct DeadAirTransport {
        links: Vec<NodeAddress>,
    }

    #[async_trait]
    impl Transport for DeadAirTransport {
        async fn send_unicast(&self, _peer: &NodeAddress, _bytes: &[u8]) -> Result<()> {
            Err(crate::error::NodeError::Transport("radio offline".into()))
        }

        async fn send_broadcast(&self, _bytes: &[u8]) -> Result<()> {
            Err(crate::error::NodeError::Transport("radio offline".into()))
        }

        fn link_exists(&self, address: &NodeAddress) -> bool {
            self.links.contains(address)
        }

        fn add_link(&mut self, address: NodeAddress) -> Result<()> {
            self.links.push(address);
            Ok(())
        }

        fn remove_link(&mut self, address: &NodeAddress) -> Result<()> {
            self.links.retain(|l| l != address);
            Ok(())
        }

        fn links(&self) -> Vec<NodeAddress> {
            self.links.clone()
        }
    }

    struct CountingWatchdog(Arc<std::sync::atomic::AtomicUsize>);

    impl Watchdog for CountingWatchdog {
        fn feed(&self) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    struct NoDiscovery;

    #[async_trait]
    impl Discovery for NoDiscovery {
        async fn start_scan(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn node(
        byte: u8,
    ) -> (
        MeshNode<RecordingTransport, NoDiscovery>,
        mpsc::UnboundedReceiver<NodeEvent>,
    ) {
        MeshNode::new(
            NodeConfig::new(addr(byte)),
            RecordingTransport::default(),
            NoDiscovery,
        )
    }

    #[tokio::test]
    async fn test_send_allocates_incrementing_ids() {
        let (mut node, _rx) = node(1);

        node.send(b"one").await.unwrap();
        node.send(b"two").await.unwrap();

        let broadcasts = node.transport().broadcasts.lock().unwrap().clone();
        assert_eq!(broadcasts.len(), 2);

        let first = Frame::decode(&broadcasts[0]).unwrap();
        let second = Frame::decode(&broadcasts[1]).unwrap();
        // First id on a fresh node is 1 (increment before use)
        assert_eq!(first.id, MessageId::from_u16(1));
        assert_eq!(second.id, MessageId::from_u16(2));
        assert_eq!(first.originator, addr(1));
    }

    #[tokio::test]
    async fn test_own_sends_are_not_logged() {
        let (mut node, _rx) = node(1);

        node.send(b"hi").await.unwrap();
        node.send_to(b"hi", addr(2)).await.unwrap();

        assert!(node.message_log().is_empty());
    }

    #[tokio::test]
    async fn test_targeted_send_without_route_floods() {
        let (mut node, _rx) = node(1);

        node.send_to(b"hi", addr(9)).await.unwrap();

        assert_eq!(node.transport().broadcasts.lock().unwrap().len(), 1);
        assert!(node.transport().unicasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_targeted_send_prefers_learned_relay() {
        let (mut node, _rx) = node(1);
        node.transport.add_link(addr(4)).unwrap();

        // Observe traffic from node 9 arriving via peer 4
        let seen = Frame::broadcast(addr(9), MessageId::from_u16(1), b"seen".to_vec());
        node.handle_frame(addr(4), &seen.encode().unwrap())
            .await
            .unwrap();

        node.send_to(b"hi", addr(9)).await.unwrap();

        let unicasts = node.transport().unicasts.lock().unwrap().clone();
        assert_eq!(unicasts.len(), 1);
        assert_eq!(unicasts[0].0, addr(4));
        let frame = Frame::decode(&unicasts[0].1).unwrap();
        assert_eq!(frame.target, Some(addr(9)));
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped_silently() {
        let (mut node, mut rx) = node(1);

        node.handle_frame(addr(2), b"not a frame").await.unwrap();
        node.handle_frame(addr(2), b"9,1,2,3,4,5,6,0,0,0,0,0,0,1,hi")
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert!(node.message_log().is_empty());
        assert!(node.transport().broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_received_broadcast_delivers_and_refloods() {
        let (mut node, mut rx) = node(1);

        let frame = Frame::broadcast(addr(2), MessageId::from_u16(1), b"hi".to_vec());
        node.handle_frame(addr(2), &frame.encode().unwrap())
            .await
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            NodeEvent::Received {
                payload: b"hi".to_vec(),
                forwarded: true,
                originator: addr(2),
            }
        );
        // Re-flooded with the original originator and id
        let broadcasts = node.transport().broadcasts.lock().unwrap().clone();
        assert_eq!(broadcasts.len(), 1);
        let forwarded = Frame::decode(&broadcasts[0]).unwrap();
        assert_eq!(forwarded.originator, addr(2));
        assert_eq!(forwarded.id, MessageId::from_u16(1));
    }

    #[tokio::test]
    async fn test_targeted_to_self_delivers_without_forwarding() {
        let (mut node, mut rx) = node(1);

        let frame = Frame::targeted(addr(2), addr(1), MessageId::from_u16(1), b"hi".to_vec());
        node.handle_frame(addr(2), &frame.encode().unwrap())
            .await
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            NodeEvent::Received {
                payload: b"hi".to_vec(),
                forwarded: false,
                originator: addr(2),
            }
        );
        assert!(node.transport().broadcasts.lock().unwrap().is_empty());
        assert!(node.transport().unicasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forward_failure_does_not_suppress_delivery() {
        let (mut node, mut rx) = MeshNode::new(
            NodeConfig::new(addr(1)),
            DeadAirTransport::default(),
            NoDiscovery,
        );

        let frame = Frame::broadcast(addr(2), MessageId::from_u16(1), b"hi".to_vec());
        // Re-flooding fails, but this node still received the message.
        node.handle_frame(addr(2), &frame.encode().unwrap())
            .await
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            NodeEvent::Received {
                payload: b"hi".to_vec(),
                forwarded: true,
                originator: addr(2),
            }
        );
        // The frame was recorded, so a retransmitted copy stays a duplicate.
        assert_eq!(node.message_log().len(), 1);
    }

    #[tokio::test]
    async fn test_send_paths_feed_watchdog() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let feeds = Arc::new(AtomicUsize::new(0));
        let (plain, _rx) = node(1);
        let mut node = plain.with_watchdog(Box::new(CountingWatchdog(feeds.clone())));

        node.send(b"one").await.unwrap();
        let after_broadcast = feeds.load(Ordering::Relaxed);
        assert!(after_broadcast >= 1);

        node.send_to(b"two", addr(9)).await.unwrap();
        assert!(feeds.load(Ordering::Relaxed) > after_broadcast);
    }

    #[tokio::test]
    async fn test_duplicate_produces_single_delivery() {
        let (mut node, mut rx) = node(1);

        let frame = Frame::broadcast(addr(2), MessageId::from_u16(1), b"hi".to_vec());
        let bytes = frame.encode().unwrap();
        node.handle_frame(addr(2), &bytes).await.unwrap();
        node.handle_frame(addr(3), &bytes).await.unwrap();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(node.transport().broadcasts.lock().unwrap().len(), 1);
        assert_eq!(node.message_log().len(), 1);
    }

    #[tokio::test]
    async fn test_self_origin_suppression() {
        let (mut node, mut rx) = node(1);

        let frame = Frame::broadcast(addr(1), MessageId::from_u16(1), b"loop".to_vec());
        node.handle_frame(addr(2), &frame.encode().unwrap())
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert!(node.message_log().is_empty());
        assert!(node.transport().broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_reconciles_link_table() {
        let (mut node, _rx) = node(1);
        // Stale link from a previous cycle
        node.transport.add_link(addr(9)).unwrap();

        node.handle_discovery_complete(vec![
            PeerCandidate::new(addr(2), 50),
            PeerCandidate::new(addr(3), 40),
        ])
        .unwrap();

        let mut links = node.transport().links();
        links.sort();
        assert_eq!(links, vec![addr(2), addr(3)]);
    }

    #[tokio::test]
    async fn test_discovery_applies_beacon_prefix_filter() {
        let (mut node, _rx) = node(1);

        node.handle_discovery_complete(vec![
            PeerCandidate::new(addr(2), 50).with_beacon("PICO_kitchen"),
            PeerCandidate::new(addr(3), 60).with_beacon("HomeRouter"),
            // No beacon name: passes the filter
            PeerCandidate::new(addr(4), 40),
        ])
        .unwrap();

        let mut links = node.transport().links();
        links.sort();
        assert_eq!(links, vec![addr(2), addr(4)]);
    }

    #[tokio::test]
    async fn test_send_complete_passthrough() {
        let (mut node, mut rx) = node(1);

        node.handle_send_complete(SendStatus::Failure);

        assert_eq!(
            rx.try_recv().unwrap(),
            NodeEvent::SendComplete(SendStatus::Failure)
        );
    }
}
