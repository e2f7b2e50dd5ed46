//! # Messaging Service
//!
//! Request/response messaging between nodes over a lossy transport.
//!
//! ## Philosophy
//!
//! - **At most once**: Nothing is retried; a lost message is simply lost
//! - **Channel scoped**: Each channel has its own passcode; traffic is
//!   enciphered per channel and the public channel `*` is tried last
//! - **One-pass timeout**: A continuation waiting for a response lives until
//!   the end of the next inbound pass, then it is dropped
//!
//! ## Flow
//!
//! Outbound: build a [`Request`] with [`MessageService::create_request`], then
//! [`MessageService::send_unicast`] or [`MessageService::send_broadcast`].
//!
//! Inbound: [`MessageService::process_inbox`] drains the transport, deciphers,
//! refreshes the address book from each sender's header, routes requests to
//! the [`Router`] and answers them, and hands responses to their waiting
//! continuations.

mod channel;
mod events;
mod pending;
mod router;
mod service;
mod transport;

pub use channel::{Channel, ChannelTable, PUBLIC_CHANNEL};
pub use events::ProtocolEvent;
pub use pending::{Continuation, PendingCalls};
pub use router::{RouteHandler, Router};
pub use service::{HeaderProvider, MessageService, COMMAND_PATH, PING_PATH};
pub use transport::{InboundMessage, Transport};

pub use ipc::{Request, Response, ResponseStatus};
