use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use voxlink::config::ConfigManager;
use voxlink::presentation::TerminalPresentation;
use voxlink::screen_lock::UnsupportedScreenLock;
use voxlink::simulation::{SimulatedTransportFactory, SimulationPlan};
use voxlink::{AppConfig, ClientCommand, VoiceClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let matches = Command::new("voxlink")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resilient voice session client")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Configuration file (defaults to the platform config dir)")
                .value_parser(clap::value_parser!(PathBuf))
        )
        .arg(
            Arg::new("mobile")
                .long("mobile")
                .help("Treat the device as mobile")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("connection-type")
                .long("connection-type")
                .value_name("TYPE")
                .help("Reported connection type: cellular, wifi, ethernet, ...")
        )
        .arg(
            Arg::new("effective-type")
                .long("effective-type")
                .value_name("TYPE")
                .help("Reported effective type: slow-2g, 2g, 3g, 4g")
                .value_parser(["slow-2g", "2g", "3g", "4g"])
        )
        .arg(
            Arg::new("probe-url")
                .long("probe-url")
                .value_name("URL")
                .help("Liveness endpoint used for latency probing")
        )
        .arg(
            Arg::new("fail")
                .long("fail")
                .value_name("REASON")
                .help("Make the next simulated attempt fail with REASON (repeatable)")
                .action(ArgAction::Append)
        )
        .arg(
            Arg::new("meter")
                .long("meter")
                .help("Render the volume meter")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    let manager = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConfigManager::load(path.clone())?,
        None => ConfigManager::new().unwrap_or_else(|e| {
            warn!("Config directory unavailable ({}), using defaults", e);
            ConfigManager::with_config(AppConfig::default())
        }),
    };
    let mut config = manager.get_config().clone();

    if matches.get_flag("mobile") {
        config.device.mobile = true;
    }
    if let Some(kind) = matches.get_one::<String>("connection-type") {
        config.device.connection_type = Some(kind.clone());
    }
    if let Some(kind) = matches.get_one::<String>("effective-type") {
        config.device.effective_type = Some(kind.clone());
    }
    if let Some(url) = matches.get_one::<String>("probe-url") {
        config.probe.url = url.clone();
    }

    let failures: VecDeque<String> = matches
        .get_many::<String>("fail")
        .map(|reasons| reasons.cloned().collect())
        .unwrap_or_default();

    let factory = Arc::new(SimulatedTransportFactory::new(SimulationPlan {
        failures,
        ..SimulationPlan::default()
    }));

    let client = VoiceClient::new(
        config,
        factory.clone(),
        Arc::new(UnsupportedScreenLock),
        Arc::new(TerminalPresentation::new(matches.get_flag("meter"))),
    )?;

    println!("voxlink - type 'help' for commands");

    let (commands_tx, commands_rx) = mpsc::channel(16);
    tokio::spawn(read_commands(commands_tx, factory));

    client.run(commands_rx).await
}

async fn read_commands(commands: mpsc::Sender<ClientCommand>, factory: Arc<SimulatedTransportFactory>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim() {
            "start" => ClientCommand::Start,
            "stop" => ClientCommand::Stop,
            "hide" => ClientCommand::VisibilityChanged(false),
            "show" => ClientCommand::VisibilityChanged(true),
            "status" => ClientCommand::Status,
            "health" => ClientCommand::Health,
            "drop" => {
                factory.set_participants(0);
                println!("Remote participant will leave silently; try 'hide' then 'show'");
                continue;
            }
            "quit" | "exit" => ClientCommand::Shutdown,
            "help" => {
                show_help();
                continue;
            }
            "" => continue,
            other => {
                println!("Unknown command: {}. Type 'help' for available commands.", other);
                continue;
            }
        };

        let shutdown = command == ClientCommand::Shutdown;
        if commands.send(command).await.is_err() || shutdown {
            return;
        }
    }

    let _ = commands.send(ClientCommand::Shutdown).await;
}

fn show_help() {
    println!("Commands:");
    println!("  start    Start a voice session");
    println!("  stop     End the current session or cancel a reconnect");
    println!("  hide     Simulate the app going to the background");
    println!("  show     Simulate the app becoming visible (runs a health check)");
    println!("  drop     Make the simulated assistant leave the call");
    println!("  status   Show session and retry state");
    println!("  health   Show the latest health report");
    println!("  quit     Exit");
}
