use serde::Deserialize;
use tokio::sync::mpsc;

use crate::audio::cues::{AudioMode, Language};
use crate::pomodoro::session::SessionMachine;

/// User intent forwarded by a presentation layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Start,
    Stop,
    Reset,
    Skip,
    EndSession,
    Authorize,
    /// Answered by the transport from its latest snapshot; no state change.
    Snapshot,
    SetBlocking { enabled: bool },
    SetAudioMode { mode: AudioMode },
    SetLanguage { language: Language },
    WhitelistAdd { site: String },
    WhitelistRemove { site: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Intent(Intent),
    Tick(u64),
    Shutdown,
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

pub fn apply(machine: &mut SessionMachine, intent: Intent) {
    match intent {
        Intent::Start => machine.start(),
        Intent::Stop => machine.stop(),
        Intent::Reset => machine.reset(),
        Intent::Skip => machine.toggle_mode(),
        Intent::EndSession => machine.end_session(),
        Intent::Authorize => {
            machine.request_authorization();
        }
        Intent::Snapshot => {}
        Intent::SetBlocking { enabled } => machine.set_blocking_enabled(enabled),
        Intent::SetAudioMode { mode } => machine.set_audio_mode(mode),
        Intent::SetLanguage { language } => machine.set_language(language),
        Intent::WhitelistAdd { site } => {
            if !machine.add_to_whitelist(&site) {
                tracing::debug!(site = %site, "whitelist entry ignored");
            }
        }
        Intent::WhitelistRemove { site } => {
            machine.remove_from_whitelist(&site);
        }
    }
}

/// Applies events one at a time until `Shutdown` or every sender is gone.
///
/// Blocking coordinator calls can sit on an OS credential prompt, so this runs
/// on a dedicated blocking thread rather than an async worker.
pub fn run_dispatcher(mut machine: SessionMachine, mut events: EventReceiver) -> SessionMachine {
    while let Some(event) = events.blocking_recv() {
        match event {
            Event::Intent(intent) => {
                tracing::debug!(?intent, "intent");
                apply(&mut machine, intent);
            }
            Event::Tick(generation) => machine.on_tick(generation),
            Event::Shutdown => break,
        }
    }
    machine.shutdown();
    machine
}
