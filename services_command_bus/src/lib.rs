//! # Command Bus
//!
//! Runs routines: locally, one command after another, or by forwarding them
//! to other nodes.
//!
//! ## Philosophy
//!
//! - **Names, not types**: Commands are `(name, handler)` pairs looked up in
//!   registration order; the first match wins and duplicates are allowed
//! - **Macros first**: A command whose text is exactly a macro name runs the
//!   macro body instead of a registered command
//! - **Waits are local**: `wait <seconds>` defers the rest of its own routine
//!   through the clock; nothing else is held up
//! - **Remote routines never run here**: They are expanded against the macro
//!   table and handed to a [`RemoteDispatcher`]
//!
//! ## Example
//!
//! ```
//! use routine::MacroTable;
//! use services_clock::Clock;
//! use services_command_bus::{CommandBus, RemoteDispatcher};
//! use services_terminal::Terminal;
//! use std::rc::Rc;
//!
//! struct Offline;
//!
//! impl RemoteDispatcher for Offline {
//!     fn forward(&self, _target: &str, _routine: &str) -> Option<usize> {
//!         None
//!     }
//! }
//!
//! let terminal = Terminal::new(16);
//! let bus = CommandBus::new(
//!     MacroTable::new(),
//!     Clock::new(),
//!     Rc::new(terminal.clone()),
//!     Rc::new(Offline),
//! );
//! bus.register(
//!     "echo",
//!     Rc::new(|command: &routine::Command| command.arguments().join(" ")),
//! );
//!
//! assert!(bus.run("echo hello"));
//! assert_eq!(terminal.lines(), vec!["> echo hello", "hello"]);
//! ```

use routine::{Command, MacroTable, Routine, ALL_TARGETS};
use services_clock::{parse_seconds, Clock};
use services_terminal::DisplaySink;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Name of the command that defers the rest of a routine
pub const WAIT_COMMAND: &str = "wait";

/// How deep macros may invoke other macros at run time
pub const MAX_MACRO_DEPTH: usize = 16;

/// Executes one command; the returned text, if any, is shown to the operator
pub type CommandHandler = Rc<dyn Fn(&Command) -> String>;

/// Ships routines addressed to other nodes
pub trait RemoteDispatcher {
    /// Sends `routine` to `target`, a node name or `*`
    ///
    /// Returns the number of nodes the routine was handed to, or `None` when
    /// `target` names no known node.
    fn forward(&self, target: &str, routine: &str) -> Option<usize>;
}

struct BusState {
    commands: Vec<(String, CommandHandler)>,
    macros: MacroTable,
}

/// Registry of commands plus the macro table
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct CommandBus {
    state: Rc<RefCell<BusState>>,
    clock: Clock,
    display: Rc<dyn DisplaySink>,
    remote: Rc<dyn RemoteDispatcher>,
}

impl CommandBus {
    pub fn new(
        macros: MacroTable,
        clock: Clock,
        display: Rc<dyn DisplaySink>,
        remote: Rc<dyn RemoteDispatcher>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                commands: Vec::new(),
                macros,
            })),
            clock,
            display,
            remote,
        }
    }

    /// Appends a command; an earlier registration of the same name shadows it
    pub fn register(&self, name: impl Into<String>, handler: CommandHandler) {
        let name = name.into();
        debug!(command = %name, "command registered");
        self.state.borrow_mut().commands.push((name, handler));
    }

    /// Registered command names in registration order
    pub fn command_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn macros(&self) -> MacroTable {
        self.state.borrow().macros.clone()
    }

    /// Parses and dispatches `text`
    ///
    /// Returns false when nothing ran: the text did not parse, was empty, or
    /// contained a command that was not found.
    pub fn run(&self, text: &str) -> bool {
        self.run_at(text, 0)
    }

    /// Runs a routine here or forwards it, depending on its target
    pub fn dispatch(&self, routine: Routine) -> bool {
        self.dispatch_at(routine, 0)
    }

    /// Runs a single command
    ///
    /// Prints `Command not found: <name>` and returns false when neither a
    /// macro nor a registered command matches.
    pub fn handle(&self, command: &Command) -> bool {
        self.handle_at(command, 0)
    }

    fn run_at(&self, text: &str, depth: usize) -> bool {
        let routine = match Routine::parse(text) {
            Ok(routine) => routine,
            Err(err) => {
                self.display.print(&err.to_string());
                return false;
            }
        };
        if routine.is_empty() {
            debug!("empty routine not run");
            return false;
        }
        self.dispatch_at(routine, depth)
    }

    fn dispatch_at(&self, mut routine: Routine, depth: usize) -> bool {
        if routine.is_local() {
            let commands: Rc<[Command]> = routine.commands().into();
            return self.run_from(commands, 0, depth);
        }

        let target = routine.target().to_string();
        let macros = self.macros();
        let expanded = routine.unpack(&macros).to_string();
        self.display.print(&format!("> @{} {}", target, expanded));

        match self.remote.forward(&target, &expanded) {
            Some(reached) => {
                info!(target = %target, reached, "routine forwarded");
                true
            }
            None if target == ALL_TARGETS => false,
            None => {
                self.display.print(&format!("Target not found: {}", target));
                false
            }
        }
    }

    /// Runs `commands[start..]`, stopping at a `wait` to resume later
    fn run_from(&self, commands: Rc<[Command]>, start: usize, depth: usize) -> bool {
        let mut all_found = true;
        for (index, command) in commands.iter().enumerate().skip(start) {
            if command.name() != WAIT_COMMAND {
                all_found &= self.handle_at(command, depth);
                continue;
            }

            let argument = command.argument(0).unwrap_or("");
            match parse_seconds(argument) {
                Some(delay) => {
                    debug!(delay_secs = delay.as_secs_f64(), "routine waiting");
                    let bus = self.clone();
                    let rest = commands.clone();
                    self.clock.queue_for_later(delay, move || {
                        bus.run_from(rest, index + 1, depth);
                    });
                    return all_found;
                }
                None => {
                    self.display
                        .print(&format!("Invalid wait time: '{}'", argument));
                }
            }
        }
        all_found
    }

    fn handle_at(&self, command: &Command, depth: usize) -> bool {
        let body = self
            .state
            .borrow()
            .macros
            .get(command.raw())
            .map(str::to_string);
        if let Some(body) = body {
            if depth >= MAX_MACRO_DEPTH {
                warn!(command = command.raw(), "macro nesting too deep");
                self.display
                    .print(&format!("Macro nesting too deep: {}", command.raw()));
                return false;
            }
            self.display.print(&format!("> {}", command.raw()));
            return self.run_at(&body, depth + 1);
        }

        let handler = self
            .state
            .borrow()
            .commands
            .iter()
            .find(|(name, _)| name == command.name())
            .map(|(_, handler)| handler.clone());
        match handler {
            Some(handler) => {
                info!(command = command.raw(), "executing command");
                self.display.print(&format!("> {}", command.raw()));
                let output = handler(command);
                if !output.is_empty() {
                    self.display.print(&output);
                }
                true
            }
            None => {
                self.display
                    .print(&format!("Command not found: {}", command.name()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_terminal::Terminal;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Default)]
    struct Outbox {
        known: Vec<&'static str>,
        sent: RefCell<Vec<(String, String)>>,
    }

    impl RemoteDispatcher for Outbox {
        fn forward(&self, target: &str, routine: &str) -> Option<usize> {
            let reached = if target == ALL_TARGETS {
                self.known.len()
            } else if self.known.iter().any(|known| *known == target) {
                1
            } else {
                return None;
            };
            self.sent
                .borrow_mut()
                .push((target.to_string(), routine.to_string()));
            Some(reached)
        }
    }

    struct Fixture {
        bus: CommandBus,
        clock: Clock,
        terminal: Terminal,
        outbox: Rc<Outbox>,
    }

    fn fixture(macros: &[(&str, &str)]) -> Fixture {
        let clock = Clock::new();
        let terminal = Terminal::new(64);
        let outbox = Rc::new(Outbox {
            known: vec!["Miner1", "Miner2"],
            ..Outbox::default()
        });
        let bus = CommandBus::new(
            macros.iter().copied().collect(),
            clock.clone(),
            Rc::new(terminal.clone()),
            outbox.clone(),
        );
        Fixture {
            bus,
            clock,
            terminal,
            outbox,
        }
    }

    fn counter(bus: &CommandBus, name: &str) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        bus.register(
            name,
            Rc::new(move |_: &Command| {
                seen.set(seen.get() + 1);
                String::new()
            }),
        );
        count
    }

    #[test]
    fn test_runs_commands_in_order() {
        let f = fixture(&[]);
        f.bus.register("say", Rc::new(|c: &Command| c.arguments().join(" ")));

        assert!(f.bus.run("say one; say \"two three\""));
        assert_eq!(
            f.terminal.lines(),
            vec!["> say one", "one", "> say \"two three\"", "two three"]
        );
    }

    #[test]
    fn test_empty_routine_is_not_run() {
        let f = fixture(&[]);
        assert!(!f.bus.run(""));
        assert!(!f.bus.run(" ; ;"));
        assert!(f.terminal.is_empty());
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let f = fixture(&[]);
        let command = Command::parse("warp 9").unwrap();
        assert!(!f.bus.handle(&command));
        assert_eq!(f.terminal.last_line().unwrap(), "Command not found: warp");
    }

    #[test]
    fn test_unknown_command_does_not_stop_routine() {
        let f = fixture(&[]);
        let count = counter(&f.bus, "tick");
        assert!(!f.bus.run("warp; tick"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_first_registration_wins() {
        let f = fixture(&[]);
        let first = counter(&f.bus, "go");
        let second = counter(&f.bus, "go");

        f.bus.run("go");
        assert_eq!((first.get(), second.get()), (1, 0));
        assert_eq!(f.bus.command_names(), vec!["go", "go"]);
    }

    #[test]
    fn test_wait_defers_rest_of_routine() {
        let f = fixture(&[]);
        let a = counter(&f.bus, "a");
        let b = counter(&f.bus, "b");

        f.bus.run("a; wait 1; b");
        assert_eq!((a.get(), b.get()), (1, 0));
        assert_eq!(f.clock.queued_task_count(), 1);

        f.clock.tick(Duration::from_millis(500));
        assert_eq!(b.get(), 0);
        f.clock.tick(Duration::from_millis(500));
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn test_wait_holds_only_its_own_routine() {
        let f = fixture(&[]);
        let a = counter(&f.bus, "a");
        let b = counter(&f.bus, "b");

        f.bus.run("wait 2; a");
        f.bus.run("b");
        assert_eq!((a.get(), b.get()), (0, 1));

        f.clock.tick(Duration::from_secs(2));
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn test_invalid_wait_is_skipped() {
        let f = fixture(&[]);
        let a = counter(&f.bus, "a");

        f.bus.run("wait soon; a");
        assert_eq!(a.get(), 1);
        assert!(f.terminal.contains("Invalid wait time: 'soon'"));
        assert_eq!(f.clock.queued_task_count(), 0);
    }

    #[test]
    fn test_macro_runs_before_registry() {
        let f = fixture(&[("lights", "on; on")]);
        let lights = counter(&f.bus, "lights");
        let on = counter(&f.bus, "on");

        assert!(f.bus.run("lights"));
        assert_eq!((lights.get(), on.get()), (0, 2));
        assert_eq!(f.terminal.lines()[0], "> lights");
    }

    #[test]
    fn test_self_invoking_macro_stops() {
        let f = fixture(&[("spin", "spin")]);
        assert!(!f.bus.run("spin"));
        assert!(f.terminal.contains("Macro nesting too deep: spin"));
    }

    #[test]
    fn test_remote_routine_is_expanded_and_forwarded() {
        let f = fixture(&[("lights", "light/on --all")]);
        let lights = counter(&f.bus, "light/on");

        assert!(f.bus.run("@Miner1 lights; wait 2"));
        assert_eq!(lights.get(), 0);
        assert_eq!(
            f.outbox.sent.borrow().as_slice(),
            &[("Miner1".to_string(), "light/on --all;wait 2;".to_string())]
        );
        assert!(f.terminal.contains("> @Miner1 light/on --all;wait 2;"));
        assert_eq!(f.clock.queued_task_count(), 0);
    }

    #[test]
    fn test_broadcast_routine_goes_to_all() {
        let f = fixture(&[]);
        assert!(f.bus.run("* ping"));
        assert_eq!(f.outbox.sent.borrow()[0].0, "*");
    }

    #[test]
    fn test_unknown_target_is_reported() {
        let f = fixture(&[]);
        assert!(!f.bus.run("@Ghost ping"));
        assert_eq!(f.terminal.last_line().unwrap(), "Target not found: Ghost");
        assert!(f.outbox.sent.borrow().is_empty());
    }

    #[test]
    fn test_parse_error_is_printed() {
        let f = fixture(&[]);
        assert!(!f.bus.run("--force"));
        assert!(f.terminal.contains("Command has no name"));
    }
}
