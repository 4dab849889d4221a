//! xcom - line-based TCP chat relay and client
//!
//! # Usage
//!
//! ```bash
//! # Run a relay on the default port (12345)
//! xcom server
//!
//! # Run a relay on a specific port
//! xcom server 9000
//!
//! # Join a relay
//! xcom client localhost 9000
//!
//! # Enable debug logging (written to stderr)
//! RUST_LOG=xcomd=debug xcom server
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: the relay stops accepting and drops its connections

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use xcom_client::{ChatClient, ClientConfig, ClientEvent};
use xcom_protocol::{ChatLine, DEFAULT_PORT};
use xcomd::config::ServerConfig;
use xcomd::registry::{spawn_registry, RelayEvent};
use xcomd::server::RelayServer;

/// xcom - minimal chat relay
#[derive(Parser, Debug)]
#[command(name = "xcom", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the chat relay
    Server {
        /// Port to listen on
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Connect to a chat relay
    Client {
        /// Relay host name or address
        host: String,
        /// Relay port
        port: u16,
    },
}

fn main() -> Result<()> {
    // Usage problems print help and exit cleanly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return Ok(());
        }
    };

    match args.command {
        Command::Server { port } => {
            init_logging("xcomd=info,xcom_protocol=info")?;
            run_server(port)
        }
        Command::Client { host, port } => {
            init_logging("xcom_client=warn,xcom_protocol=warn")?;
            run_client(host, port)
        }
    }
}

/// Installs the stderr log subscriber; `RUST_LOG` replaces `default_directives`.
fn init_logging(default_directives: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Runs the relay (async entry point).
#[tokio::main]
async fn run_server(port: u16) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), port, "xcom relay starting");

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    spawn_console_observer(registry.subscribe());

    let server = match RelayServer::bind(ServerConfig::with_port(port), registry, cancel_token).await
    {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Server error");
            eprintln!("Server error: {e}");
            return Ok(());
        }
    };

    println!("Server running on port {}", server.local_addr().port());
    server.run().await;

    info!("xcom relay stopped");
    Ok(())
}

/// Prints relay activity to stdout.
fn spawn_console_observer(mut events: broadcast::Receiver<RelayEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = console_line(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Console observer lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Console text for a relay event.
///
/// Join and leave lines are covered by the connect and disconnect notices,
/// so only text lines are echoed.
fn console_line(event: &RelayEvent) -> Option<String> {
    match event {
        RelayEvent::Connected { .. } => Some("New client connected".to_string()),
        RelayEvent::Broadcast {
            line: line @ ChatLine::Text { .. },
            ..
        } => Some(line.to_string()),
        RelayEvent::Disconnected { .. } => Some("A client disconnected".to_string()),
        RelayEvent::Broadcast { .. } | RelayEvent::Named { .. } => None,
    }
}

/// Runs one client session (async entry point).
#[tokio::main]
async fn run_client(host: String, port: u16) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_client_events(event_rx));

    let client = ChatClient::new(ClientConfig::new(host, port), event_tx);
    let result = client.run(tokio::io::stdin()).await;

    // Closing the event channel lets the printer drain and finish
    drop(client);
    if let Err(e) = printer.await {
        warn!(error = %e, "Console printer failed");
    }

    if let Err(e) = result {
        error!(error = %e, "Client error");
        eprintln!("Client error: {e}");
    }

    Ok(())
}

/// Prints client events to stdout until the client is done.
async fn print_client_events(mut events: mpsc::UnboundedReceiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Connected { host, port } => {
                println!("Connected to server {host}:{port}");
            }
            ClientEvent::NamePrompt => {
                print!("Enter your username: ");
                let _ = std::io::stdout().flush();
            }
            ClientEvent::Line(line) => println!("{line}"),
            ClientEvent::Disconnected => println!("Disconnected from server."),
        }
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
