//! # Inter-Node Communication (IPC)
//!
//! This crate defines the messages nodes exchange.
//!
//! ## Philosophy
//!
//! - **Messages, not shared state**: Nodes only learn about each other from messages
//! - **Self-describing**: Every message carries its sender's id, name and position
//! - **Traceable**: Every message has an id; a response names the request it answers
//!
//! ## Wire format
//!
//! ```text
//! REQUEST::<header>{"Id":"..","OriginId":"..","Path":"ping",..}</header><body>{..}</body>
//! RESPONSE::<header>{"Id":"..","RespondingToId":"..","status":"200",..}</header><body>{..}</body>
//! ```
//!
//! Header and body are codec maps. Every value is text; typed accessors read
//! missing or malformed values as empty or zero.

pub mod error;
pub mod message;
pub mod typed;

pub use error::MessageError;
pub use message::{body, headers, Message, MessageId};
pub use typed::{Envelope, Request, Response, ResponseStatus, REQUEST_PREFIX, RESPONSE_PREFIX};
