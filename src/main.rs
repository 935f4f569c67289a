//! Pentest Relay - Entry Point
//!
//! Command-line front end over the relay library: probe the agent, run one
//! command, pull a command out of AI text, or run a batch through the queue.

use clap::{Parser, Subcommand};
use pentest_relay::agent::{ConnectionMonitor, ConnectionState, DispatchClient};
use pentest_relay::audit::AuditLog;
use pentest_relay::command::{CommandExecutor, ExecutionRequest, NoAnalysis};
use pentest_relay::core::config::RelayConfig;
use pentest_relay::core::error::Result;
use pentest_relay::llm::extract_command;
use pentest_relay::queue::{parse_batch, CommandQueue, QueueStatus};

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Orchestrate commands on a local execution agent
#[derive(Parser, Debug)]
#[command(name = "pentest-relay")]
#[command(about = "Dispatch and queue commands for a local execution agent")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent base URL (overrides config and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the agent once and print its status
    Status,

    /// Keep probing and report every status change until Ctrl-C
    Watch,

    /// Run a single command on the agent
    Exec {
        /// Command line to run
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,

        /// Seconds the agent may spend on the command
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Read AI text from stdin and print the command it suggests
    Extract {
        /// Also run the command and print the audit entry
        #[arg(long, default_value_t = false)]
        run: bool,

        /// Tool name recorded in the audit entry
        #[arg(long, default_value = "")]
        tool: String,

        /// Target recorded in the audit entry
        #[arg(long)]
        target: Option<String>,
    },

    /// Run commands from a file (one per line, `-` for stdin) in order
    Batch {
        file: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pentest_relay=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(?config, "Configuration loaded");

    let rt = Runtime::new()?;
    rt.block_on(run(args.command, config))
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?.with_env_overrides()?,
        None => RelayConfig::from_env()?,
    };
    if let Some(endpoint) = &args.endpoint {
        config.agent.endpoint = endpoint.clone();
        config.validate()?;
    }
    Ok(config)
}

async fn run(command: Command, config: RelayConfig) -> Result<ExitCode> {
    let state = ConnectionState::new();
    let monitor = ConnectionMonitor::from_settings(&config.agent, state.clone());
    let dispatch = DispatchClient::from_settings(&config.agent, state.clone());

    match command {
        Command::Status => {
            let connection = monitor.probe().await;
            println!("Agent {}: {}", config.agent.base_url(), connection.status);
            if let Some(version) = &connection.version {
                println!("Version: {}", version);
            }
            if let Some(tools) = &connection.allowed_tools {
                println!("Allowed tools ({}): {}", tools.len(), tools.join(", "));
            }
            Ok(exit_code(connection.is_online()))
        }

        Command::Watch => {
            let shutdown = CancellationToken::new();
            let handle = monitor.spawn(shutdown.clone());
            let mut rx = state.subscribe();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let connection = rx.borrow_and_update().clone();
                        println!("{} {}", chrono::Utc::now().format("%H:%M:%S"), connection.status);
                    }
                }
            }
            shutdown.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Monitor task ended abnormally");
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Exec { command, timeout } => {
            monitor.probe().await;
            let command = command.join(" ");
            let result = dispatch.execute(&command, timeout).await;
            if !result.output.is_empty() {
                print!("{}", result.output);
            }
            if !result.error.is_empty() {
                eprintln!("{}", result.error);
            }
            Ok(exit_code(result.success))
        }

        Command::Extract { run, tool, target } => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;

            if !run {
                return Ok(match extract_command(&text) {
                    Some(command) => {
                        println!("{}", command);
                        ExitCode::SUCCESS
                    }
                    None => {
                        eprintln!("No command found");
                        ExitCode::FAILURE
                    }
                });
            }

            let connection = monitor.probe().await;
            if !connection.is_online() {
                eprintln!("Agent is {}; not executing", connection.status);
                return Ok(ExitCode::FAILURE);
            }

            let log = AuditLog::new();
            let request = ExecutionRequest { tool, target };
            let entry =
                CommandExecutor::auto_execute(&text, &request, &dispatch, &NoAnalysis, &log).await;
            match entry {
                Some(entry) => {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                    Ok(exit_code(entry.success))
                }
                None => {
                    eprintln!("No command found");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Batch { file } => {
            let text = if file.as_os_str() == "-" {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                text
            } else {
                std::fs::read_to_string(&file)?
            };

            let queue = CommandQueue::new();
            queue.enqueue_many(parse_batch(&text));
            if queue.is_empty() {
                eprintln!("No commands to run");
                return Ok(ExitCode::FAILURE);
            }

            monitor.probe().await;
            let Some(mut handle) = queue.start(dispatch.clone()) else {
                return Ok(ExitCode::FAILURE);
            };

            let summary = tokio::select! {
                summary = &mut handle => summary,
                _ = tokio::signal::ctrl_c() => {
                    queue.stop();
                    handle.await
                }
            };
            let summary = match summary {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(error = %e, "Queue worker failed");
                    return Ok(ExitCode::FAILURE);
                }
            };

            for (index, item) in queue.items().iter().enumerate() {
                let status = format!("{:?}", item.status).to_lowercase();
                println!("[{}] {:<9} {}", index + 1, status, item.command);
                if let Some(error) = &item.error {
                    println!("      error: {}", error);
                }
            }
            println!(
                "{} completed, {} failed, {:.0}% done{}",
                summary.completed,
                summary.failed,
                queue.progress(),
                if summary.stopped { " (stopped)" } else { "" }
            );

            let all_completed = queue
                .items()
                .iter()
                .all(|item| item.status == QueueStatus::Completed);
            Ok(exit_code(all_completed))
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
