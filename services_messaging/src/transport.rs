//! The link between a node and the network

use core_types::NodeId;

/// A payload pulled from the inbox, tagged with the channel it arrived on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// One node's endpoint on a lossy network
pub trait Transport {
    /// Sends to one node on one channel; false if it could not be delivered
    fn send_unicast(&self, target: NodeId, channel: &str, payload: &str) -> bool;

    /// Sends to every node listening on `channel`; delivery is not reported
    fn send_broadcast(&self, channel: &str, payload: &str);

    /// Drains everything received since the last call
    fn receive(&self) -> Vec<InboundMessage>;
}
