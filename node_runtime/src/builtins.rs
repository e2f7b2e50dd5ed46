//! Commands every node understands

use crate::node::Node;
use routine::Command;
use std::rc::Rc;
use tracing::warn;

/// Entries shown by `log` without a count
const DEFAULT_LOG_LINES: usize = 10;

pub(crate) fn register(node: &Node) {
    let bus = node.bus.clone();
    node.bus.register(
        "help",
        Rc::new(move |_: &Command| {
            let mut out = format!("Commands: {}", bus.command_names().join(", "));
            let macros = bus.macros();
            if !macros.is_empty() {
                let names: Vec<&str> = macros.names().collect();
                out.push_str(&format!("\nMacros: {}", names.join(", ")));
            }
            out
        }),
    );

    let messaging = node.messaging.clone();
    node.bus.register(
        "ping",
        Rc::new(move |_: &Command| {
            messaging.ping();
            "Pinging all nodes".to_string()
        }),
    );

    let booter = node.clone();
    node.bus.register(
        "boot",
        Rc::new(move |_: &Command| {
            booter.boot();
            String::new()
        }),
    );

    let purger = node.clone();
    node.bus
        .register("purge", Rc::new(move |command: &Command| purge(&purger, command)));

    let storage = node.storage.clone();
    node.bus.register(
        "get",
        Rc::new(move |command: &Command| match command.argument(0) {
            None => "Usage: get <key>".to_string(),
            Some(key) if storage.contains(key) => format!("{} = {}", key, storage.get(key)),
            Some(key) => format!("{} is not set", key),
        }),
    );

    let storage = node.storage.clone();
    node.bus.register(
        "set",
        Rc::new(move |command: &Command| {
            let (Some(key), [_, value @ ..]) = (command.argument(0), command.arguments()) else {
                return "Usage: set <key> <value>".to_string();
            };
            if value.is_empty() {
                return "Usage: set <key> <value>".to_string();
            }
            let value = value.join(" ");
            storage.set(key, &value);
            format!("{} = {}", key, value)
        }),
    );

    node.bus.register(
        "print",
        Rc::new(|command: &Command| command.arguments().join(" ")),
    );

    let terminal = node.terminal.clone();
    node.bus.register(
        "clear",
        Rc::new(move |_: &Command| {
            terminal.clear();
            String::new()
        }),
    );

    let logs = node.logs.clone();
    let name = node.config.name.clone();
    node.bus.register(
        "log",
        Rc::new(move |command: &Command| {
            let count = command
                .argument(0)
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_LOG_LINES);
            let entries = logs.recent_with_field("node", &name, count);
            if entries.is_empty() {
                return "No log entries".to_string();
            }
            entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }),
    );
}

/// `purge [--almanac] [--storage] [--force]`; no selection means both
fn purge(node: &Node, command: &Command) -> String {
    let selected = command.has_option("almanac") || command.has_option("storage");
    let almanac = !selected || command.has_option("almanac");
    let storage = !selected || command.has_option("storage");

    let mut targets = Vec::new();
    if almanac {
        targets.push(format!("almanac ({} records)", node.almanac.len()));
    }
    if storage {
        targets.push(format!("storage ({} keys)", node.storage.len()));
    }
    let targets = targets.join(" and ");

    if !command.has_option("force") {
        return format!("Would purge {}. Use --force to confirm.", targets);
    }
    if almanac {
        node.almanac.clear();
    }
    if storage {
        node.storage.clear();
    }
    warn!(almanac, storage, "purged");
    format!("Purged {}.", targets)
}
