//! Doorlink console bridge.
//!
//! Binds a transport session to the hub, prints every observer event as a
//! JSON line and accepts commands on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Hub from the environment
//! HUB_HOST=192.168.8.108 HUB_PORT=12345 doorlink
//!
//! # Flags override the environment
//! doorlink --hub-host 127.0.0.1 --hub-port 4000 --log-level debug
//! ```

mod console;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use console::ConsoleCommand;
use doorlink_core::ModuleId;
use doorlink_network::{ENV_HUB_HOST, ENV_HUB_PORT, Observer, SessionConfig, TransportSession};

/// Bridge between a UDP door-lock hub and the console
#[derive(Parser, Debug)]
#[command(name = "doorlink")]
#[command(version)]
struct Args {
    /// Hub host (overrides HUB_HOST)
    #[arg(long)]
    hub_host: Option<String>,

    /// Hub UDP port (overrides HUB_PORT)
    #[arg(long)]
    hub_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let config = SessionConfig::from_vars(|key| match key {
            ENV_HUB_HOST => self.hub_host.clone().or_else(|| std::env::var(key).ok()),
            ENV_HUB_PORT => self
                .hub_port
                .map(|p| p.to_string())
                .or_else(|| std::env::var(key).ok()),
            _ => None,
        })?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.session_config().context("invalid hub configuration")?;
    let session = TransportSession::bind(config)
        .await
        .context("failed to bind UDP endpoint")?;
    info!("Doorlink bridge ready on {} -> hub {}", session.local_addr(), session.hub_addr());

    let observer = session.connect_observer();
    run_console(&session, observer).await?;

    session.shutdown();
    info!("Doorlink bridge stopped");
    Ok(())
}

async fn run_console(session: &TransportSession, mut observer: Observer) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            event = observer.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse(&line) {
                    None => {}
                    Some(Err(e)) => warn!("{e}"),
                    Some(Ok(ConsoleCommand::Quit)) => break,
                    Some(Ok(command)) => execute(session, &observer, command).await,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn execute(session: &TransportSession, observer: &Observer, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Status(module) => {
            if let Err(e) = observer.request_status(module).await {
                error!(error = %e, "Status query failed");
            }
        }
        ConsoleCommand::Send(request) => match observer.send_command(request).await {
            Ok(id) => info!(correlation_id = %id, "Command sent"),
            Err(e) => error!(error = %e, "Command failed"),
        },
        ConsoleCommand::Lock(module) => spawn_actuation(session.clone(), module, true),
        ConsoleCommand::Unlock(module) => spawn_actuation(session.clone(), module, false),
        ConsoleCommand::Info(module) => {
            let session = session.clone();
            tokio::spawn(async move {
                match session.door_info(module.clone()).await {
                    Some(info) => match serde_json::to_string(&info) {
                        Ok(json) => println!("{json}"),
                        Err(e) => error!(error = %e, "Door info encoding failed"),
                    },
                    None => warn!(%module, "No door info (timeout or send failure)"),
                }
            });
        }
        ConsoleCommand::Raw(text) => {
            if let Err(e) = session.send_raw(&text).await {
                error!(error = %e, "Raw send failed");
            }
        }
        ConsoleCommand::Doors => {
            for door in session.broadcaster().doors() {
                let online = session.is_online(&door.module_id);
                match console::door_line(&door, online) {
                    Ok(json) => println!("{json}"),
                    Err(e) => error!(error = %e, "Door encoding failed"),
                }
            }
        }
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
}

/// Lock or unlock in the background; polling may take seconds.
fn spawn_actuation(session: TransportSession, module: ModuleId, lock: bool) {
    tokio::spawn(async move {
        let result = if lock {
            session.lock(module.clone()).await
        } else {
            session.unlock(module.clone()).await
        };
        match result {
            Ok(actuation) => match actuation.convergence {
                Some(outcome) => info!(
                    %module,
                    state = ?outcome.state,
                    attempts = outcome.attempts,
                    "Actuation acknowledged"
                ),
                None => info!(%module, status = %actuation.reply.status, "Actuation reported"),
            },
            Err(e) => error!(%module, error = %e, "Actuation failed"),
        }
    });
}
