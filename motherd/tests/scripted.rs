//! Scripted host runs

use motherd::{HostRuntime, HostRuntimeConfig, HostRuntimeError};
use node_runtime::NodeState;
use services_logger::LogBuffer;
use std::io::Write;
use std::time::Duration;

const CLUSTER: &str = r#"[
    {"id": 1, "name": "Mother", "channels": {"*": "", "ops": "pw"},
     "macros": {"greet": "print hello", "beacon": "set beacon on"},
     "heartbeat_interval_secs": 600.0},
    {"id": 2, "name": "Miner1", "channels": {"*": "", "ops": "pw"},
     "heartbeat_interval_secs": 600.0}
]"#;

fn load_cluster() -> HostRuntimeConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CLUSTER.as_bytes()).unwrap();
    HostRuntimeConfig {
        nodes: node_config::load_list(file.path()).unwrap(),
        ..HostRuntimeConfig::default()
    }
}

fn run(script: &str) -> (HostRuntime, String) {
    let mut config = load_cluster();
    config.script = Some(script.to_string());
    let mut host = HostRuntime::new(config, LogBuffer::default()).unwrap();
    let mut out = Vec::new();
    host.run(&mut out).unwrap();
    (host, String::from_utf8(out).unwrap())
}

#[test]
fn test_script_drives_remote_routine() {
    let (host, out) = run("tick 2\nMother @Miner1 greet\ntick 1\ndump Miner1\n");

    assert!(host
        .nodes()
        .iter()
        .all(|node| node.state() == NodeState::Working));
    assert!(out.starts_with("Miner1 [2] WORKING"));
    assert!(out.contains("REQ: Mother> print hello;"));
    assert!(out.contains("hello"));
}

#[test]
fn test_broadcast_and_storage() {
    let (host, _) = run("tick 2\nMother * beacon\ntick 1\n");
    let miner = host.node("Miner1").unwrap();
    assert_eq!(miner.storage().get("beacon"), "on");
    assert!(!host.node("Mother").unwrap().storage().contains("beacon"));
}

#[test]
fn test_wait_spans_ticks() {
    let (host, _) = run("tick 2\nMother print a; wait 1; print b\ntick 0.5\n");
    let mother = host.node("Mother").unwrap();
    assert!(mother.terminal().contains("> print a"));
    assert!(!mother.terminal().contains("> print b"));

    let (host, _) = run("tick 2\nMother print a; wait 1; print b\ntick 1\n");
    assert!(host.node("Mother").unwrap().terminal().contains("> print b"));
}

#[test]
fn test_input_before_boot_is_ignored() {
    let (host, out) = run("Mother print early\ntick 2\ndump Mother\n");
    assert!(host.elapsed() >= Duration::from_secs(2));
    assert!(!out.contains("early"));
    assert!(out.contains("Mother is online."));
}

#[test]
fn test_bad_script_is_rejected() {
    let mut config = load_cluster();
    config.script = Some("tick never\n".to_string());
    assert!(matches!(
        HostRuntime::new(config, LogBuffer::default()),
        Err(HostRuntimeError::Script(_))
    ));
}
