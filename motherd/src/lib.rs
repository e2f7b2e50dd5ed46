//! # Mother Host Runtime
//!
//! A deterministic simulation host for a cluster of nodes.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: Nodes print to their own terminals; the host decides
//!   what reaches stdout
//! - **Simulated time**: Every node advances by the same tick, in
//!   configuration order
//! - **Deterministic mode is first-class**: A script drives input and time,
//!   so a run can be replayed exactly
//!
//! ## Responsibilities
//!
//! The host:
//! - Builds every configured node on one [`sim_network::SimNetwork`]
//! - Ticks the nodes, feeding them scripted input
//! - Dumps node terminals on request

pub mod runtime;
pub mod script;

pub use runtime::{HostRuntime, HostRuntimeConfig, HostRuntimeError, DEFAULT_IDLE_STEPS};
pub use script::{HostScript, ScriptError, ScriptStep};
