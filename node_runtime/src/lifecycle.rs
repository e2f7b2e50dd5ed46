//! Node states and the boot sequence

use services_clock::Coroutine;
use services_terminal::Terminal;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// Where a node is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Uninitialized,
    Boot,
    Working,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Uninitialized => "UNINITIALIZED",
            NodeState::Boot => "BOOT",
            NodeState::Working => "WORKING",
        };
        f.write_str(name)
    }
}

/// Shared view of the node state
#[derive(Debug, Clone, Default)]
pub(crate) struct Lifecycle {
    state: Rc<Cell<NodeState>>,
}

impl Lifecycle {
    pub(crate) fn get(&self) -> NodeState {
        self.state.get()
    }

    pub(crate) fn set(&self, state: NodeState) {
        self.state.set(state);
    }

    pub(crate) fn is_working(&self) -> bool {
        self.get() == NodeState::Working
    }
}

/// Runs a closure on first resume and finishes
struct Once<F>(Option<F>);

impl<F: FnOnce()> Coroutine for Once<F> {
    fn resume(&mut self) -> Option<Duration> {
        if let Some(work) = self.0.take() {
            work();
        }
        None
    }
}

/// One module brought up during boot
pub(crate) struct BootModule {
    name: &'static str,
    steps: Box<dyn Coroutine>,
}

impl BootModule {
    /// A module whose boot is a single step
    pub(crate) fn once(name: &'static str, work: impl FnOnce() + 'static) -> Self {
        Self::stepped(name, Once(Some(work)))
    }

    /// A module that yields its own waits while booting
    pub(crate) fn stepped(name: &'static str, steps: impl Coroutine + 'static) -> Self {
        Self {
            name,
            steps: Box::new(steps),
        }
    }
}

/// Brings modules up one after another, then marks the node working
pub(crate) struct BootSequence {
    modules: VecDeque<BootModule>,
    current: Option<BootModule>,
    started: usize,
    total: usize,
    terminal: Terminal,
    lifecycle: Lifecycle,
}

impl BootSequence {
    pub(crate) fn new(modules: Vec<BootModule>, terminal: Terminal, lifecycle: Lifecycle) -> Self {
        lifecycle.set(NodeState::Boot);
        Self {
            total: modules.len(),
            modules: modules.into(),
            current: None,
            started: 0,
            terminal,
            lifecycle,
        }
    }
}

impl Coroutine for BootSequence {
    fn resume(&mut self) -> Option<Duration> {
        if let Some(module) = self.current.as_mut() {
            if let Some(wait) = module.steps.resume() {
                return Some(wait);
            }
            self.current = None;
        }

        match self.modules.pop_front() {
            Some(module) => {
                self.started += 1;
                info!(module = module.name, step = self.started, total = self.total, "booting module");
                self.terminal.print(&format!(
                    "Booting modules: ({} / {})",
                    self.started, self.total
                ));
                self.current = Some(module);
                Some(Duration::ZERO)
            }
            None => {
                self.lifecycle.set(NodeState::Working);
                self.terminal.print("Mother is online.");
                info!("node online");
                None
            }
        }
    }
}
