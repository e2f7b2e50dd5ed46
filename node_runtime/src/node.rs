//! One node: its services, routes and tick loop

use crate::builtins;
use crate::error::NodeError;
use crate::identity::NodeIdentity;
use crate::lifecycle::{BootModule, BootSequence, Lifecycle, NodeState};
use core_types::NodeId;
use ipc::{Request, Response, ResponseStatus};
use node_config::NodeConfig;
use routine::{MacroTable, ALL_TARGETS};
use services_almanac::{AddressBook, Almanac, Sighting};
use services_clock::Clock;
use services_command_bus::{CommandBus, RemoteDispatcher};
use services_logger::LogBuffer;
use services_messaging::{
    ChannelTable, Continuation, MessageService, ProtocolEvent, Transport, COMMAND_PATH, PING_PATH,
};
use services_storage::LocalStorage;
use services_terminal::Terminal;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, info_span, Span};

/// Hands routines addressed to other nodes to the message service
struct Forwarder {
    messaging: MessageService,
    terminal: Terminal,
}

impl Forwarder {
    /// Prints the outcome of a forwarded routine when the answer arrives
    fn report(&self) -> Continuation {
        let terminal = self.terminal.clone();
        Box::new(move |response: &Response| {
            terminal.print(&format!(
                "RES: {}> {}",
                response.origin_name(),
                response.status()
            ));
        })
    }
}

impl RemoteDispatcher for Forwarder {
    fn forward(&self, target: &str, routine: &str) -> Option<usize> {
        let records = if target == ALL_TARGETS {
            self.messaging.remote_nodes()
        } else {
            vec![self.messaging.find_node(target)?]
        };
        let sent = records
            .iter()
            .filter(|record| {
                self.messaging
                    .send_command(record, routine, Some(self.report()))
            })
            .count();
        Some(sent)
    }
}

/// A running node
///
/// Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Node {
    pub(crate) config: Rc<NodeConfig>,
    pub(crate) clock: Clock,
    pub(crate) terminal: Terminal,
    pub(crate) storage: LocalStorage,
    pub(crate) almanac: Almanac,
    pub(crate) messaging: MessageService,
    pub(crate) bus: CommandBus,
    pub(crate) logs: LogBuffer,
    lifecycle: Lifecycle,
    tasks_scheduled: Rc<Cell<bool>>,
    span: Span,
}

impl Node {
    /// Builds a node with empty storage
    pub fn new(
        config: NodeConfig,
        transport: Rc<dyn Transport>,
        logs: LogBuffer,
    ) -> Result<Self, NodeError> {
        Self::with_storage(config, transport, logs, LocalStorage::new())
    }

    /// Builds a node on top of previously saved storage
    pub fn restore(
        config: NodeConfig,
        transport: Rc<dyn Transport>,
        logs: LogBuffer,
        saved: &str,
    ) -> Result<Self, NodeError> {
        Self::with_storage(config, transport, logs, LocalStorage::from_saved(saved))
    }

    fn with_storage(
        config: NodeConfig,
        transport: Rc<dyn Transport>,
        logs: LogBuffer,
        storage: LocalStorage,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let span = info_span!("node", node = %config.name);

        let mut channels = ChannelTable::new();
        for (name, passcode) in &config.channels {
            channels
                .insert(name, passcode)
                .map_err(|source| NodeError::Channel {
                    channel: name.clone(),
                    source,
                })?;
        }

        let identity = Rc::new(NodeIdentity::from_config(&config));
        let clock = Clock::new();
        let terminal = Terminal::new(config.terminal_lines);
        let almanac = Almanac::with_store(Rc::new(storage.clone()));
        let messaging =
            MessageService::new(channels, transport, identity, Rc::new(almanac.clone()));
        let macros: MacroTable = config
            .macros
            .iter()
            .map(|(name, body)| (name.as_str(), body.as_str()))
            .collect();
        let bus = CommandBus::new(
            macros,
            clock.clone(),
            Rc::new(terminal.clone()),
            Rc::new(Forwarder {
                messaging: messaging.clone(),
                terminal: terminal.clone(),
            }),
        );

        let node = Node {
            config: Rc::new(config),
            clock,
            terminal,
            storage,
            almanac,
            messaging,
            bus,
            logs,
            lifecycle: Lifecycle::default(),
            tasks_scheduled: Rc::new(Cell::new(false)),
            span,
        };
        node.add_routes();
        node.watch_protocol();
        builtins::register(&node);
        debug!(node = %node.config.name, "node constructed");
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state(&self) -> NodeState {
        self.lifecycle.get()
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn almanac(&self) -> &Almanac {
        &self.almanac
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn messaging(&self) -> &MessageService {
        &self.messaging
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    /// Starts the boot sequence unless one is already running
    pub fn boot(&self) {
        let _entered = self.span.enter();
        if self.lifecycle.get() == NodeState::Boot {
            debug!("boot already in progress");
            return;
        }
        info!("boot started");
        let sequence = BootSequence::new(
            self.boot_modules(),
            self.terminal.clone(),
            self.lifecycle.clone(),
        );
        self.clock.start_coroutine(sequence);
    }

    /// Advances the node by `delta`
    ///
    /// An uninitialized node boots first. The inbox is handled before the
    /// clock so replies to this tick's sends are seen on the next tick.
    pub fn tick(&self, delta: Duration) {
        let _entered = self.span.enter();
        if self.lifecycle.get() == NodeState::Uninitialized {
            self.boot();
        }
        self.messaging.process_inbox();
        self.clock.toggle_loader();
        self.clock.tick(delta);
    }

    /// Runs operator input; ignored until the node is working
    pub fn input(&self, text: &str) -> bool {
        let _entered = self.span.enter();
        if !self.lifecycle.is_working() {
            debug!(input = text, state = %self.lifecycle.get(), "input ignored");
            return false;
        }
        self.bus.run(text)
    }

    /// Name, id, state and the activity indicator
    pub fn status_line(&self) -> String {
        format!(
            "{} [{}] {} {}",
            self.config.name,
            self.config.id.short(),
            self.lifecycle.get(),
            self.clock.loader()
        )
    }

    /// The terminal, newest line first, under the status line
    pub fn dump(&self) -> String {
        self.terminal.render(&self.status_line())
    }

    /// Serialized storage, for [`Node::restore`]
    pub fn save_data(&self) -> String {
        self.storage.save_data()
    }

    /// Refreshes this node's own address book record
    pub(crate) fn refresh_position(&self) {
        let channels = self.config.channels.keys().cloned().collect();
        self.almanac.record_sighting(Sighting {
            id: self.config.id.to_string(),
            name: self.config.name.clone(),
            environment: self.config.environment(),
            channels,
            is_local: true,
        });
    }

    fn boot_modules(&self) -> Vec<BootModule> {
        let almanac = self.almanac.clone();
        let identity = self.clone();
        let scheduler = self.clone();
        let messaging = self.messaging.clone();
        vec![
            BootModule::once("almanac", move || {
                let loaded = almanac.load();
                debug!(loaded, "address book restored");
            }),
            BootModule::once("identity", move || identity.refresh_position()),
            BootModule::once("scheduler", move || scheduler.schedule_tasks()),
            BootModule::stepped(
                "network",
                std::iter::once_with(move || {
                    messaging.ping();
                    Duration::ZERO
                }),
            ),
        ]
    }

    /// Heartbeat and position refresh; scheduled on the first boot only
    fn schedule_tasks(&self) {
        if self.tasks_scheduled.replace(true) {
            return;
        }
        let heartbeat = self.config.heartbeat_interval();
        if !heartbeat.is_zero() {
            let messaging = self.messaging.clone();
            self.clock.schedule(heartbeat, move || {
                debug!("heartbeat");
                messaging.ping();
            });
        }
        let position = self.config.position_interval();
        if !position.is_zero() {
            let node = self.clone();
            self.clock.schedule(position, move || node.refresh_position());
        }
    }

    fn add_routes(&self) {
        let messaging = self.messaging.clone();
        self.messaging.add_route(
            PING_PATH,
            Rc::new(move |request: &Request| {
                Some(messaging.create_response(request, ResponseStatus::Ok, None))
            }),
        );

        let node = self.clone();
        self.messaging.add_route(
            COMMAND_PATH,
            Rc::new(move |request: &Request| Some(node.run_remote(request))),
        );
    }

    /// Runs the routine carried by a `command` request
    fn run_remote(&self, request: &Request) -> Response {
        let text = request.body_str(ipc::body::COMMAND);
        if !self.lifecycle.is_working() {
            debug!(origin = request.origin_name(), "remote command refused while booting");
            return self
                .messaging
                .create_response(request, ResponseStatus::Error, None);
        }

        self.terminal
            .print(&format!("REQ: {}> {}", request.origin_name(), text));
        let status = if self.bus.run(text) {
            ResponseStatus::CommandExecuted
        } else {
            ResponseStatus::Error
        };
        self.messaging.create_response(request, status, None)
    }

    fn watch_protocol(&self) {
        let terminal = self.terminal.clone();
        self.messaging.subscribe(move |event| {
            if let ProtocolEvent::RequestFailed { target_id } = event {
                terminal.print(&format!("Unable to reach node {}", target_id));
            }
        });
    }
}
