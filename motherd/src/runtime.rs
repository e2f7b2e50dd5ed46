//! # Host Runtime
//!
//! Builds the cluster and runs it, scripted or idle.

use crate::script::{HostScript, ScriptError, ScriptStep};
use node_config::{ConfigError, NodeConfig};
use node_runtime::{Node, NodeError};
use services_clock::DEFAULT_TICK;
use services_logger::LogBuffer;
use sim_network::SimNetwork;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Steps an unscripted run takes when no limit is given
pub const DEFAULT_IDLE_STEPS: usize = 60;

/// Words a script reserves; no node may be named after them
const RESERVED_NAMES: [&str; 2] = ["tick", "dump"];

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Output error: {0}")]
    Io(#[from] io::Error),

    #[error("No nodes configured")]
    NoNodes,

    #[error("Node name is reserved: {0}")]
    ReservedName(String),

    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Tick must be longer than zero")]
    ZeroTick,
}

/// Host runtime configuration
#[derive(Debug, Clone)]
pub struct HostRuntimeConfig {
    /// Nodes to build, ticked in this order
    pub nodes: Vec<NodeConfig>,
    /// Optional script text
    pub script: Option<String>,
    /// Simulated time per step
    pub tick: Duration,
    /// Step limit; unscripted runs default to [`DEFAULT_IDLE_STEPS`]
    pub max_steps: Option<usize>,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            nodes: vec![NodeConfig::new(core_types::NodeId::new(1), "Mother")],
            script: None,
            tick: DEFAULT_TICK,
            max_steps: None,
        }
    }
}

/// Host runtime
pub struct HostRuntime {
    network: SimNetwork,
    nodes: Vec<Node>,
    script: Option<HostScript>,
    tick: Duration,
    max_steps: Option<usize>,
    step_count: usize,
    elapsed: Duration,
}

impl HostRuntime {
    /// Creates a runtime; `logs` backs every node's `log` command
    pub fn new(config: HostRuntimeConfig, logs: LogBuffer) -> Result<Self, HostRuntimeError> {
        if config.nodes.is_empty() {
            return Err(HostRuntimeError::NoNodes);
        }
        if config.tick.is_zero() {
            return Err(HostRuntimeError::ZeroTick);
        }
        let script = config
            .script
            .as_deref()
            .map(HostScript::from_text)
            .transpose()?;

        let network = SimNetwork::new();
        let mut names = BTreeSet::new();
        let mut ids = BTreeSet::new();
        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node_config in config.nodes {
            if RESERVED_NAMES.iter().any(|reserved| *reserved == node_config.name) {
                return Err(HostRuntimeError::ReservedName(node_config.name));
            }
            if !names.insert(node_config.name.clone()) || !ids.insert(node_config.id) {
                return Err(HostRuntimeError::DuplicateNode(node_config.name));
            }
            let endpoint = network.attach(node_config.id, node_config.channels.keys().cloned());
            let node = Node::new(node_config, Rc::new(endpoint), logs.clone())?;
            info!(node = node.name(), id = %node.id(), "node created");
            nodes.push(node);
        }

        Ok(Self {
            network,
            nodes,
            script,
            tick: config.tick,
            max_steps: config.max_steps,
            step_count: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Runs the script, or idles for the step limit, writing dumps to `out`
    ///
    /// An unscripted run dumps every node when it ends.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<(), HostRuntimeError> {
        let Some(mut script) = self.script.take() else {
            let steps = self.max_steps.unwrap_or(DEFAULT_IDLE_STEPS);
            for _ in 0..steps {
                self.step();
            }
            for node in &self.nodes {
                writeln!(out, "{}", node.dump())?;
            }
            return Ok(());
        };

        while let Some(step) = script.next_step() {
            if self.limit_reached() {
                warn!(steps = self.step_count, "step limit reached, script stopped");
                break;
            }
            match step {
                ScriptStep::Tick(duration) => self.advance(duration),
                ScriptStep::Input { node, text } => {
                    let accepted = self.node(&node)?.input(&text);
                    debug!(node = %node, input = %text, accepted, "scripted input");
                }
                ScriptStep::Dump(node) => {
                    writeln!(out, "{}", self.node(&node)?.dump())?;
                }
            }
        }
        Ok(())
    }

    /// Ticks every node once
    pub fn step(&mut self) {
        self.tick_all(self.tick);
    }

    /// Advances simulated time by `duration`, one tick at a time
    ///
    /// The last tick is shortened to land exactly on `duration`.
    pub fn advance(&mut self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() && !self.limit_reached() {
            let delta = remaining.min(self.tick);
            self.tick_all(delta);
            remaining -= delta;
        }
    }

    fn tick_all(&mut self, delta: Duration) {
        for node in &self.nodes {
            node.tick(delta);
        }
        self.step_count += 1;
        self.elapsed += delta;
    }

    fn limit_reached(&self) -> bool {
        self.max_steps.is_some_and(|max| self.step_count >= max)
    }

    /// The node called `name`
    pub fn node(&self, name: &str) -> Result<&Node, HostRuntimeError> {
        self.nodes
            .iter()
            .find(|node| node.name() == name)
            .ok_or_else(|| HostRuntimeError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Simulated time since the run started
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
