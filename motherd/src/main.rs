//! # Mother Host Daemon
//!
//! Main entry point for the simulation host.

use motherd::{HostRuntime, HostRuntimeConfig};
use services_logger::{LogBuffer, LogBufferLayer};
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("motherd", String::as_str);

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    let logs = LogBuffer::default();
    init_tracing(&logs);

    let mut runtime = HostRuntime::new(config, logs).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    let stdout = io::stdout();
    if let Err(e) = runtime.run(&mut stdout.lock()) {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }
}

/// Diagnostics go to stderr, filtered by `RUST_LOG`, and to the buffer the
/// nodes' `log` command reads
fn init_tracing(logs: &LogBuffer) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(filter);
    let buffer_layer = LogBufferLayer::new(logs.clone()).with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(buffer_layer)
        .init();
}

fn parse_args(args: &[String]) -> Result<HostRuntimeConfig, String> {
    let mut config = HostRuntimeConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config.nodes = node_config::load_list(Path::new(&args[i]))
                    .map_err(|e| format!("Failed to load config: {}", e))?;
            }
            "--script" | "-s" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --script".to_string());
                }
                let script_text = fs::read_to_string(&args[i])
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(script_text);
            }
            "--tick" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --tick".to_string());
                }
                config.tick = services_clock::parse_seconds(&args[i])
                    .filter(|tick| *tick > Duration::ZERO)
                    .ok_or_else(|| format!("Invalid tick value: {}", args[i]))?;
            }
            "--max-steps" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --max-steps".to_string());
                }
                let steps = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid max-steps value: {}", args[i]))?;
                config.max_steps = Some(steps);
            }
            "--help" | "-h" => {
                print_usage(args.first().map_or("motherd", String::as_str));
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>      JSON list of node configurations");
    eprintln!("  -s, --script <FILE>      Host script to run");
    eprintln!("  --tick <SECONDS>         Simulated time per step (default 1/6)");
    eprintln!("  --max-steps <N>          Maximum steps to run");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Without a script the nodes idle for --max-steps steps (default 60),");
    eprintln!("then every terminal is printed.");
    eprintln!();
    eprintln!("Examples:");
    eprintln!(
        "  {} --config demos/cluster.json --script demos/lights.mscript",
        program
    );
    eprintln!("  RUST_LOG=debug {} --max-steps 30", program);
}
