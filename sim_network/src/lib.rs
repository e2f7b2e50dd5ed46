//! # Simulated Network
//!
//! An in-memory stand-in for the radio links between nodes.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Delivery is immediate and ordered; nothing is lost
//!   unless a node is switched unreachable
//! - **Channel membership**: A node hears only the channels it joined, on
//!   unicast and broadcast alike
//! - **Lossy on demand**: [`SimNetwork::set_reachable`] cuts a node off in
//!   both directions to simulate a lost link
//!
//! Each node gets an [`Endpoint`], its [`Transport`] onto the shared network.

use core_types::NodeId;
use services_messaging::{InboundMessage, Transport};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use tracing::{debug, trace};

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub unicast_sent: u64,
    pub unicast_dropped: u64,
    pub broadcast_sent: u64,
    pub delivered: u64,
}

#[derive(Debug)]
struct Link {
    channels: BTreeSet<String>,
    inbox: VecDeque<InboundMessage>,
    reachable: bool,
}

#[derive(Debug, Default)]
struct NetworkState {
    links: BTreeMap<NodeId, Link>,
    stats: NetworkStats,
}

impl NetworkState {
    fn deliver(&mut self, to: NodeId, channel: &str, payload: &str) -> bool {
        let Some(link) = self.links.get_mut(&to) else {
            return false;
        };
        if !link.reachable || !link.channels.contains(channel) {
            return false;
        }
        link.inbox.push_back(InboundMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        self.stats.delivered += 1;
        true
    }

    fn can_send(&self, from: NodeId, channel: &str) -> bool {
        self.links
            .get(&from)
            .is_some_and(|link| link.reachable && link.channels.contains(channel))
    }
}

/// The shared medium
///
/// Cloning yields another handle onto the same network.
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins node `id` to the network on `channels`
    ///
    /// Attaching an id again replaces its channel list and empties its inbox.
    pub fn attach<I, S>(&self, id: NodeId, channels: I) -> Endpoint
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: BTreeSet<String> = channels.into_iter().map(Into::into).collect();
        debug!(node = %id, channels = channels.len(), "node attached");
        self.state.borrow_mut().links.insert(
            id,
            Link {
                channels,
                inbox: VecDeque::new(),
                reachable: true,
            },
        );
        Endpoint {
            id,
            network: self.clone(),
        }
    }

    /// Cuts node `id` off, or reconnects it
    pub fn set_reachable(&self, id: NodeId, reachable: bool) {
        if let Some(link) = self.state.borrow_mut().links.get_mut(&id) {
            link.reachable = reachable;
        }
    }

    pub fn is_reachable(&self, id: NodeId) -> bool {
        self.state
            .borrow()
            .links
            .get(&id)
            .is_some_and(|link| link.reachable)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.state.borrow().links.keys().copied().collect()
    }

    /// Messages waiting in node `id`'s inbox
    pub fn queued(&self, id: NodeId) -> usize {
        self.state
            .borrow()
            .links
            .get(&id)
            .map_or(0, |link| link.inbox.len())
    }

    pub fn stats(&self) -> NetworkStats {
        self.state.borrow().stats
    }
}

/// One node's attachment to a [`SimNetwork`]
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: NodeId,
    network: SimNetwork,
}

impl Endpoint {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Transport for Endpoint {
    fn send_unicast(&self, target: NodeId, channel: &str, payload: &str) -> bool {
        let mut state = self.network.state.borrow_mut();
        state.stats.unicast_sent += 1;
        let delivered =
            state.can_send(self.id, channel) && state.deliver(target, channel, payload);
        if !delivered {
            state.stats.unicast_dropped += 1;
        }
        trace!(from = %self.id, to = %target, channel, delivered, "unicast");
        delivered
    }

    fn send_broadcast(&self, channel: &str, payload: &str) {
        let mut state = self.network.state.borrow_mut();
        state.stats.broadcast_sent += 1;
        if !state.can_send(self.id, channel) {
            return;
        }
        let listeners: Vec<NodeId> = state
            .links
            .keys()
            .copied()
            .filter(|id| *id != self.id)
            .collect();
        let heard = listeners
            .into_iter()
            .filter(|id| state.deliver(*id, channel, payload))
            .count();
        trace!(from = %self.id, channel, heard, "broadcast");
    }

    fn receive(&self) -> Vec<InboundMessage> {
        self.network
            .state
            .borrow_mut()
            .links
            .get_mut(&self.id)
            .map(|link| link.inbox.drain(..).collect())
            .unwrap_or_default()
    }
}
