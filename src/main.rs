use clap::Parser;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

mod audio;
mod blocker;
mod cli;
mod config;
mod daemon;
mod error;
mod notification;
mod pomodoro;
mod ws;

use audio::cues::Announcer;
use audio::player::CommandAudio;
use blocker::coordinator::BlockingCoordinator;
use blocker::elevate::ShellElevator;
use blocker::hosts;
use blocker::whitelist::{JsonPreferences, WhitelistStore};
use cli::{Cli, Commands, WhitelistAction};
use config::Config;
use daemon::{Event, EventSender, Intent};
use notification::{DesktopNotifier, Notifier};
use pomodoro::pomodoro::{POMODORO_BREAK_MINUTES, POMODORO_WORK_MINUTES, Phase, TICK_INTERVAL_MS};
use pomodoro::session::{RunState, SessionMachine, SessionSnapshot};
use pomodoro::ticker::IntervalTicker;

fn init_tracing(cli: &Cli) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    match &cli.log {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

fn load_whitelist() -> Result<WhitelistStore, error::ConfigError> {
    let prefs = JsonPreferences::new(config::preferences_path()?);
    Ok(WhitelistStore::load(Box::new(prefs)))
}

fn build_coordinator(config: &Config) -> Result<BlockingCoordinator, error::ConfigError> {
    Ok(BlockingCoordinator::new(
        &config.blocking,
        Box::new(ShellElevator::new(config.blocking.elevation)),
        load_whitelist()?,
    ))
}

fn build_machine(
    config: &Config,
    blocking_enabled: bool,
    events: EventSender,
) -> Result<SessionMachine, error::ConfigError> {
    let announcer = Announcer::new(
        CommandAudio::from_config(&config.audio),
        config.audio.mode,
        config.audio.language,
    )
    .with_voice(config.audio.speech_rate, config.audio.volume);

    let notifier = DesktopNotifier;
    notifier.request_permission();

    let ticker = IntervalTicker::new(
        Handle::current(),
        Duration::from_millis(TICK_INTERVAL_MS),
        Arc::new(move |generation| {
            let _ = events.send(Event::Tick(generation));
        }),
    );

    Ok(SessionMachine::new(
        Box::new(announcer),
        Box::new(notifier),
        build_coordinator(config)?,
        Box::new(ticker),
        blocking_enabled,
    ))
}

/// Prints a line whenever the phase, run state or block status changes.
async fn print_status(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut last: Option<(Phase, RunState, bool)> = None;
    while updates.changed().await.is_ok() {
        let snap = updates.borrow_and_update().clone();
        let key = (snap.phase, snap.state, snap.blocking_active);
        if last == Some(key) {
            continue;
        }
        last = Some(key);
        println!(
            "{} {} {} [{:?}]{}",
            snap.phase.emoji(),
            snap.label.to_uppercase(),
            snap.time_string,
            snap.state,
            if snap.blocking_active { " 🛡 blocking" } else { "" }
        );
    }
}

async fn run_daemon(
    config: Config,
    block: bool,
    autostart: bool,
    serve: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🍅 pomofocus - Pomodoro Timer & Site Blocker");
    println!("======================================================");
    println!(
        "Pomodoro settings: {}min work / {}min break",
        POMODORO_WORK_MINUTES, POMODORO_BREAK_MINUTES
    );

    let blocking_enabled = block || config.blocking.enabled;
    if blocking_enabled {
        println!("Site blocking: ON ({})", config.blocking.hosts_path.display());
    }

    let (events_tx, events_rx) = daemon::create_event_channel();
    let machine = build_machine(&config, blocking_enabled, events_tx.clone())?;
    let updates = machine.subscribe();

    if serve && config.server.enabled {
        let listener = ws::control_server::bind(config.server.listen).await?;
        println!("Control channel on ws://{}", listener.local_addr()?);
        tokio::spawn(ws::control_server::serve(
            listener,
            events_tx.clone(),
            updates.clone(),
        ));
    }
    tokio::spawn(print_status(updates));

    if autostart {
        let _ = events_tx.send(Event::Intent(Intent::Start));
    }
    println!("Press Ctrl+C to stop\n");

    let dispatcher =
        tokio::task::spawn_blocking(move || daemon::run_dispatcher(machine, events_rx));

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    let _ = events_tx.send(Event::Shutdown);
    let machine = dispatcher.await?;
    tracing::info!(
        phase = machine.phase().label(),
        remaining = machine.remaining_seconds(),
        running = machine.is_running(),
        "dispatcher stopped"
    );
    if machine.blocker().is_blocking() {
        eprintln!("Hosts file still carries a block; run `pomofocus unblock`.");
    }
    Ok(())
}

fn run_whitelist(action: WhitelistAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = load_whitelist()?;
    match action {
        WhitelistAction::Add { site } => {
            if store.add(&site) {
                println!("Added {}", store.list().last().map(String::as_str).unwrap_or(""));
            } else {
                println!("Nothing added (empty or already whitelisted)");
            }
        }
        WhitelistAction::Remove { site } => {
            if store.remove(&site) {
                println!("Removed {site}");
            } else {
                println!("{site} is not whitelisted");
            }
        }
        WhitelistAction::List => {
            for site in store.list() {
                println!("  {site}");
            }
        }
    }
    Ok(())
}

fn run_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(&config.blocking.hosts_path)?;
    if !hosts::contains_block(&contents) {
        println!("No block in {}", config.blocking.hosts_path.display());
        return Ok(());
    }
    println!("Blocked via {}:", config.blocking.hosts_path.display());
    for site in hosts::blocked_sites(&contents) {
        println!("  {site}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli)?;
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        None => run_daemon(config, false, false, true).await,
        Some(Commands::Run {
            block,
            start,
            no_server,
        }) => run_daemon(config, block, start, !no_server).await,
        Some(Commands::Whitelist { action }) => run_whitelist(action),
        Some(Commands::Unblock) => {
            let mut coordinator = build_coordinator(&config)?;
            coordinator.purge_stale_block()?;
            println!("Hosts file cleaned");
            Ok(())
        }
        Some(Commands::Status) => run_status(&config),
    }
}
