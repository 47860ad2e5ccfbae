//! Discrete-event logic simulator CLI.
//!
//! This binary provides a single entry point for driving the kernel. It performs:
//! 1. **Script run:** Feed a JSON-lines command script to the kernel and print every reply.
//! 2. **Demo:** Build and exercise a half adder, showing the command/reply protocol in action.

use std::io::{BufRead, BufReader};
use std::{fs, process, thread};

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use logicsim_core::controller::{self, Command, Notice, Request};
use logicsim_core::{ComponentLibrary, Config, Controller, Core};

#[derive(Parser, Debug)]
#[command(
    name = "logicsim",
    author,
    version,
    about = "Discrete-event digital logic simulator",
    long_about = "Drive the simulation kernel with a JSON-lines command script, or run the\nbuilt-in half-adder demo.\n\nExamples:\n  logicsim run circuit.jsonl\n  logicsim run circuit.jsonl --rate 10000\n  logicsim demo"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed a command script to the kernel and print replies as JSON lines.
    Run {
        /// Script path: one JSON command object per line.
        path: String,

        /// Simulated time units per wall-clock second.
        #[arg(long)]
        rate: Option<f64>,

        /// Scheduling interval in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Run the built-in half-adder demo.
    Demo,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            path,
            rate,
            interval_ms,
        } => cmd_run(&path, rate, interval_ms),
        Commands::Demo => cmd_demo(),
    }
}

/// Spawns the kernel on its own thread and returns the channel endpoints.
fn spawn_kernel(
    config: Config,
) -> (
    crossbeam_channel::Sender<Request>,
    crossbeam_channel::Receiver<Notice>,
    thread::JoinHandle<()>,
) {
    let ((command_tx, command_rx), (notice_tx, notice_rx)) = controller::channel_pair(&config);
    let handle = thread::spawn(move || {
        let mut controller =
            Controller::new(ComponentLibrary::with_builtins(), config, command_rx, notice_tx);
        let mut core = Core::new();
        if let Err(e) = core.run(&mut controller) {
            error!(%e, "kernel stopped abnormally");
        }
    });
    (command_tx, notice_rx, handle)
}

/// Reads a JSON-lines script, sends each command, and prints every reply.
fn cmd_run(path: &str, rate: Option<f64>, interval_ms: Option<u64>) {
    let file = fs::File::open(path).unwrap_or_else(|e| {
        eprintln!("Error opening script {path}: {e}");
        process::exit(1);
    });

    let mut config = Config::default();
    if let Some(rate) = rate {
        config.rate = rate;
    }
    if let Some(interval) = interval_ms {
        config.scheduling_interval_ms = interval;
    }

    let (command_tx, notice_rx, handle) = spawn_kernel(config);

    // Printing replies on a separate thread keeps slow scripts from
    // backing up the bounded outbound channel.
    let printer = thread::spawn(move || {
        for notice in notice_rx {
            match serde_json::to_string(&notice) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Error encoding reply: {e}"),
            }
        }
    });

    let mut next_request_id: u64 = 1;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.unwrap_or_else(|e| {
            eprintln!("Error reading script {path}: {e}");
            process::exit(1);
        });
        if line.trim().is_empty() || line.trim_start().starts_with("//") {
            continue;
        }
        let mut request: Request = serde_json::from_str(&line).unwrap_or_else(|e| {
            eprintln!("Error in script {path} line {}: {e}", number + 1);
            process::exit(1);
        });
        if request.request_id == 0 {
            request.request_id = next_request_id;
        }
        next_request_id = request.request_id + 1;
        if command_tx.send(request).is_err() {
            eprintln!("Kernel stopped before the script finished");
            process::exit(1);
        }
    }

    let _ = command_tx.send(Request {
        request_id: next_request_id,
        command: Command::Quit,
    });
    drop(command_tx);
    let _ = handle.join();
    let _ = printer.join();
}

/// Builds a half adder and toggles its inputs, printing every reply.
fn cmd_demo() {
    let (command_tx, notice_rx, handle) = spawn_kernel(Config::default());

    let script = [
        serde_json::json!({ "type": "create", "GUID": "wire.interconnect", "id": 1 }),
        serde_json::json!({ "type": "create", "GUID": "wire.interconnect", "id": 2 }),
        serde_json::json!({ "type": "create", "GUID": "gate.xor", "id": 3 }),
        serde_json::json!({ "type": "create", "GUID": "gate.and", "id": 4 }),
        // Input wires fan out to both gates with unit delay.
        serde_json::json!({ "type": "connect", "source_id": 1, "source_port": 0, "sink_id": 3, "sink_port": 0, "delay": 1 }),
        serde_json::json!({ "type": "connect", "source_id": 1, "source_port": 1, "sink_id": 4, "sink_port": 0, "delay": 1 }),
        serde_json::json!({ "type": "connect", "source_id": 2, "source_port": 0, "sink_id": 3, "sink_port": 1, "delay": 1 }),
        serde_json::json!({ "type": "connect", "source_id": 2, "source_port": 1, "sink_id": 4, "sink_port": 1, "delay": 1 }),
        serde_json::json!({ "type": "edge", "id": 1, "input": 0, "state": true, "delay": 10 }),
        serde_json::json!({ "type": "edge", "id": 2, "input": 0, "state": true, "delay": 15 }),
        serde_json::json!({ "type": "query", "id": 3 }),
        serde_json::json!({ "type": "query", "id": 4 }),
    ];

    for (index, mut value) in script.into_iter().enumerate() {
        if let Some(object) = value.as_object_mut() {
            let _ = object.insert("request-id".into(), serde_json::json!(index as u64 + 1));
        }
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("Error building demo command: {e}");
                process::exit(1);
            }
        };
        if command_tx.send(request).is_err() {
            eprintln!("Kernel stopped before the demo finished");
            process::exit(1);
        }
    }

    // Let the edges land before shutting down.
    thread::sleep(std::time::Duration::from_millis(100));
    let _ = command_tx.send(Request {
        request_id: u64::from(u16::MAX),
        command: Command::Quit,
    });
    drop(command_tx);

    for notice in &notice_rx {
        match serde_json::to_string(&notice) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error encoding reply: {e}"),
        }
    }
    let _ = handle.join();
}
