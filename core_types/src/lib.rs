//! # Core Types
//!
//! This crate defines the fundamental types shared by every Mother crate.
//!
//! ## Philosophy
//!
//! - **Explicit identities**: Nodes are addressed by typed ids, never by bare integers.
//! - **Plain data**: Everything here is `Clone` and serializable.
//! - **No behavior**: Services live in their own crates; this crate only names things.
//!
//! ## Key Types
//!
//! - [`NodeId`]: Transport-level address of a node
//! - [`Vector3`]: A world position as reported in message headers
//! - [`NodeEnvironment`]: Per-node environment fields stamped into every header

pub mod geometry;
pub mod ids;
pub mod uuid_tools;

pub use geometry::{NodeEnvironment, ParseVectorError, Vector3};
pub use ids::{NodeId, ParseNodeIdError};
pub use uuid_tools::{new_uuid, new_uuid_string};
