//! # Node Runtime
//!
//! Wires the services of one node together and drives its lifecycle.
//!
//! ## Philosophy
//!
//! - **Explicit wiring**: Every service is constructed here and handed the
//!   handles it needs; there is no global node
//! - **Tick driven**: [`Node::tick`] handles the inbox, then advances the
//!   clock; nothing happens between ticks except operator input
//! - **Boot first**: A node ignores input until its boot sequence finishes
//!
//! ## Lifecycle
//!
//! `Uninitialized → Boot → Working`. The first tick of an uninitialized node
//! starts the boot sequence, which brings up each module in turn and then
//! prints `Mother is online.`. The `boot` command runs it again.

mod builtins;
mod error;
mod identity;
mod lifecycle;
mod node;

pub use error::NodeError;
pub use identity::NodeIdentity;
pub use lifecycle::NodeState;
pub use node::Node;
