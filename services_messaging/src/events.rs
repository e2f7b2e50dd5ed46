use core_types::NodeId;

/// Notifications emitted by the message service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A request arrived and was handed to the router
    RequestReceived,
    /// An outbound message was accepted by the transport
    RequestSent,
    /// No channel could deliver a unicast message
    RequestFailed { target_id: NodeId },
}
