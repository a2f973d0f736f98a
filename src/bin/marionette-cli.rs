//! Marionette CLI - run behavior scripts against a stub game world
//!
//! Useful for trying out scripts without a game attached: every host API
//! call is answered immediately with a canned result and the thread's
//! lifecycle events are printed as they arrive.

use clap::{Parser, Subcommand};
use marionette::{ObjectId, Value, VirtualMachine, VmConfig, VmEvent};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "marionette")]
#[command(about = "Scripting runtime for driving in-world game agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script for one agent against a stub world
    Run {
        /// Path to the script file
        script: PathBuf,

        /// Agent identifier the script controls
        #[arg(short, long, default_value = "agent")]
        agent: String,

        /// Number of execution contexts in the pool
        #[arg(long, default_value = "2")]
        contexts: usize,

        /// Tick period in milliseconds
        #[arg(long, default_value = "10")]
        tick_ms: u64,
    },

    /// Parse a script and report syntax errors without running it
    Check {
        /// Path to the script file
        script: PathBuf,
    },
}

/// Canned answer for a host call, standing in for the game world.
fn stub_response(request: &marionette::ApiRequest) -> Value {
    match request.api {
        marionette::HostApi::GetNearestVoxels => Value::map([
            (
                "position",
                Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
            ),
            ("flag", Value::Bool(true)),
        ]),
        _ => Value::Null,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            agent,
            contexts,
            tick_ms,
        } => {
            let code = std::fs::read_to_string(&script)?;
            let (vm, mut events) = VirtualMachine::new(VmConfig {
                contexts,
                tick: Duration::from_millis(tick_ms),
                ..VmConfig::default()
            })?;

            let object_id = ObjectId::new(agent);
            let info = vm.run(object_id.clone(), code);
            println!("Dispatched {} to context {}", info.thread_id, info.context);

            while let Some(event) = events.recv().await {
                match event {
                    VmEvent::Started(info) => {
                        println!("Thread {} started for {}", info.thread_id, info.object_id);
                    }
                    VmEvent::Api(request) => {
                        println!(
                            "  {} called {}({})",
                            request.object_id, request.api, request.params
                        );
                        vm.send_response(
                            &request.object_id,
                            request.request_id,
                            stub_response(&request),
                        );
                    }
                    VmEvent::Stopped { info, reason } => {
                        println!("Thread {} stopped: {}", info.thread_id, reason);
                        break;
                    }
                }
            }
        }

        Commands::Check { script } => {
            let code = std::fs::read_to_string(&script)?;
            match marionette::script::parse_script(&code) {
                Ok(stmts) => println!("OK: {} top-level statements", stmts.len()),
                Err(err) => {
                    eprintln!("{}", err);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
