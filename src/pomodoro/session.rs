//! Session state machine.
//!
//! ```text
//! (Idle | Paused) --start--> Running --stop--> Paused
//! any --reset--> Idle (same phase)      any --skip--> Idle (other phase)
//! Running --countdown hits 0--> Idle (other phase)
//! ```
//!
//! All operations run to completion on the dispatcher thread; nothing here is
//! reentrant. Side effects (cues, notifications, site blocking) go through the
//! collaborators handed to [`SessionMachine::new`].

use chrono::Local;
use serde::Serialize;
use tokio::sync::watch;

use super::pomodoro::{Phase, format_clock};
use super::ticker::Ticker;
use crate::audio::cues::{AudioMode, Cue, CueSink, Language};
use crate::blocker::coordinator::BlockingCoordinator;
use crate::notification::Notifier;

pub const NOTIFICATION_TITLE: &str = "Timer Finished!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub label: String,
    pub color: String,
    pub state: RunState,
    pub remaining_seconds: u32,
    pub time_string: String,
    pub is_running: bool,
    /// 1.0 at the start of a phase, 0.0 when it completes.
    pub progress: f64,
    pub blocking_enabled: bool,
    pub whitelist: Vec<String>,
    pub authorized: bool,
    pub blocking_active: bool,
    pub audio_mode: AudioMode,
    pub language: Language,
    pub at: String,
}

pub struct SessionMachine {
    phase: Phase,
    remaining: u32,
    running: bool,
    has_started_once: bool,
    blocking_enabled: bool,
    active_tick: Option<u64>,
    cues: Box<dyn CueSink>,
    notifier: Box<dyn Notifier>,
    blocker: BlockingCoordinator,
    ticker: Box<dyn Ticker>,
    updates: watch::Sender<SessionSnapshot>,
}

impl SessionMachine {
    pub fn new(
        cues: Box<dyn CueSink>,
        notifier: Box<dyn Notifier>,
        blocker: BlockingCoordinator,
        ticker: Box<dyn Ticker>,
        blocking_enabled: bool,
    ) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        let machine = Self {
            phase: Phase::Work,
            remaining: Phase::Work.duration_secs(),
            running: false,
            has_started_once: false,
            blocking_enabled,
            active_tick: None,
            cues,
            notifier,
            blocker,
            ticker,
            updates,
        };
        machine.publish();
        machine
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn blocker(&self) -> &BlockingCoordinator {
        &self.blocker
    }

    pub fn run_state(&self) -> RunState {
        if self.running {
            RunState::Running
        } else if self.has_started_once {
            RunState::Paused
        } else {
            RunState::Idle
        }
    }

    pub fn progress(&self) -> f64 {
        f64::from(self.remaining) / f64::from(self.phase.duration_secs())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            label: self.phase.label().to_string(),
            color: self.phase.color().to_string(),
            state: self.run_state(),
            remaining_seconds: self.remaining,
            time_string: format_clock(self.remaining),
            is_running: self.running,
            progress: self.progress(),
            blocking_enabled: self.blocking_enabled,
            whitelist: self.blocker.whitelist().list().to_vec(),
            authorized: self.blocker.is_authorized(),
            blocking_active: self.blocker.is_blocking(),
            audio_mode: self.cues.mode(),
            language: self.cues.language(),
            at: Local::now().to_rfc3339(),
        }
    }

    /// Change notifications; the receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    // ── Intents ──────────────────────────────────────────────────────

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        if !self.has_started_once {
            self.has_started_once = true;
            self.cues.play(Cue::Start);
            if self.blocking_enabled && self.phase == Phase::Work {
                self.blocker.enable_blocking();
            }
        } else {
            self.cues.play(Cue::Resume);
        }

        self.active_tick = Some(self.ticker.start());
        tracing::info!(
            phase = self.phase.label(),
            remaining = %format_clock(self.remaining),
            "{} timer running",
            self.phase.emoji()
        );
        self.publish();
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.cues.play(Cue::Pause);
        self.halt_countdown();
        tracing::info!(remaining = %format_clock(self.remaining), "timer paused");
        self.publish();
    }

    pub fn reset(&mut self) {
        self.halt_countdown();
        self.cues.play(Cue::Reset);
        self.remaining = self.phase.duration_secs();
        self.has_started_once = false;
        tracing::info!(phase = self.phase.label(), "timer reset");
        self.publish();
    }

    /// Skip to the other phase.
    pub fn toggle_mode(&mut self) {
        self.halt_countdown();
        self.cues.play(Cue::Skip);
        self.switch_phase();
        self.publish();
    }

    pub fn end_session(&mut self) {
        self.halt_countdown();
        self.phase = Phase::Work;
        self.remaining = Phase::Work.duration_secs();
        self.has_started_once = false;

        if self.blocker.is_blocking() {
            self.blocker.disable_blocking();
        }

        self.cues.play(Cue::Reset);
        tracing::info!("session ended");
        self.publish();
    }

    /// Countdown tick. Ticks from a cancelled countdown are dropped.
    pub fn on_tick(&mut self, generation: u64) {
        if !self.running || self.active_tick != Some(generation) {
            tracing::trace!(generation, "stale tick ignored");
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.on_phase_complete();
        } else {
            self.publish();
        }
    }

    fn on_phase_complete(&mut self) {
        self.halt_countdown();

        let body = match self.phase {
            Phase::Work => {
                self.cues.play(Cue::WorkComplete);
                "Time for a break."
            }
            Phase::ShortBreak => {
                self.cues.play(Cue::BreakComplete);
                "Back to work!"
            }
        };
        tracing::info!(phase = self.phase.label(), "🔔 phase complete");
        self.notifier.notify(NOTIFICATION_TITLE, body);

        self.switch_phase();
        self.publish();
    }

    pub fn set_blocking_enabled(&mut self, enabled: bool) {
        self.blocking_enabled = enabled;
        tracing::info!(enabled, "site blocking preference changed");
        self.publish();
    }

    pub fn set_audio_mode(&mut self, mode: AudioMode) {
        self.cues.set_mode(mode);
        tracing::info!(?mode, "audio mode changed");
        self.publish();
    }

    pub fn set_language(&mut self, language: Language) {
        self.cues.set_language(language);
        tracing::info!(lang = language.code(), "voice language changed");
        self.publish();
    }

    pub fn request_authorization(&mut self) -> bool {
        let granted = self.blocker.request_authorization();
        self.publish();
        granted
    }

    pub fn add_to_whitelist(&mut self, site: &str) -> bool {
        let added = self.blocker.whitelist_mut().add(site);
        self.publish();
        added
    }

    pub fn remove_from_whitelist(&mut self, site: &str) -> bool {
        let removed = self.blocker.whitelist_mut().remove(site);
        self.publish();
        removed
    }

    /// Leaves nothing behind: countdown cancelled and hosts file restored.
    pub fn shutdown(&mut self) {
        self.halt_countdown();
        if self.blocker.is_blocking() {
            self.blocker.disable_blocking();
        }
        self.publish();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn halt_countdown(&mut self) {
        if self.active_tick.take().is_some() {
            self.ticker.cancel();
        }
        self.running = false;
    }

    fn switch_phase(&mut self) {
        let previous = self.phase;
        self.phase = previous.next();
        self.remaining = self.phase.duration_secs();
        self.has_started_once = false;

        if self.blocking_enabled {
            match (previous, self.phase) {
                (Phase::Work, Phase::ShortBreak) => self.blocker.disable_blocking(),
                (Phase::ShortBreak, Phase::Work) => self.blocker.enable_blocking(),
                _ => {}
            }
        }

        tracing::info!(
            from = previous.label(),
            to = self.phase.label(),
            "{} switched to {}",
            self.phase.emoji(),
            self.phase.label()
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blocker::coordinator::tests::{FakeExecutor, coordinator_with};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingCues(Arc<Mutex<Vec<Cue>>>, AudioMode, Language);

    impl CueSink for RecordingCues {
        fn play(&self, cue: Cue) {
            self.0.lock().unwrap().push(cue);
        }

        fn mode(&self) -> AudioMode {
            self.1
        }

        fn language(&self) -> Language {
            self.2
        }

        fn set_mode(&mut self, mode: AudioMode) {
            self.1 = mode;
        }

        fn set_language(&mut self, language: Language) {
            self.2 = language;
        }
    }

    #[derive(Default, Clone)]
    struct RecordingNotifier(Arc<Mutex<Vec<(String, String)>>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    #[derive(Default)]
    struct TickerLog {
        generation: u64,
        starts: usize,
        cancels: usize,
    }

    #[derive(Default, Clone)]
    struct ManualTicker(Arc<Mutex<TickerLog>>);

    impl Ticker for ManualTicker {
        fn start(&mut self) -> u64 {
            let mut log = self.0.lock().unwrap();
            log.generation += 1;
            log.starts += 1;
            log.generation
        }

        fn cancel(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }
    }

    pub(crate) struct Harness {
        pub(crate) machine: SessionMachine,
        cues: RecordingCues,
        notes: RecordingNotifier,
        ticker: ManualTicker,
        pub(crate) executor: FakeExecutor,
    }

    impl Harness {
        pub(crate) fn new(blocking_enabled: bool) -> Self {
            Self::with_whitelist(blocking_enabled, &[])
        }

        fn with_whitelist(blocking_enabled: bool, whitelist: &[&str]) -> Self {
            let cues = RecordingCues::default();
            let notes = RecordingNotifier::default();
            let ticker = ManualTicker::default();
            let executor = FakeExecutor::default();
            let machine = SessionMachine::new(
                Box::new(cues.clone()),
                Box::new(notes.clone()),
                coordinator_with(executor.clone(), whitelist),
                Box::new(ticker.clone()),
                blocking_enabled,
            );
            Self {
                machine,
                cues,
                notes,
                ticker,
                executor,
            }
        }

        pub(crate) fn generation(&self) -> u64 {
            self.ticker.0.lock().unwrap().generation
        }

        fn tick(&mut self, times: u32) {
            let generation = self.generation();
            for _ in 0..times {
                self.machine.on_tick(generation);
            }
        }

        fn cues(&self) -> Vec<Cue> {
            self.cues.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn starts_idle_in_work() {
        let h = Harness::new(false);
        assert_eq!(h.machine.phase(), Phase::Work);
        assert_eq!(h.machine.remaining_seconds(), 1500);
        assert_eq!(h.machine.run_state(), RunState::Idle);
        assert_eq!(h.machine.progress(), 1.0);
    }

    #[test]
    fn start_is_idempotent() {
        let mut h = Harness::new(false);
        h.machine.start();
        h.machine.start();

        assert!(h.machine.is_running());
        assert_eq!(h.cues(), vec![Cue::Start]);
        assert_eq!(h.ticker.0.lock().unwrap().starts, 1);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut h = Harness::new(false);
        h.machine.stop();
        assert!(h.cues().is_empty());
        assert_eq!(h.machine.run_state(), RunState::Idle);
    }

    #[test]
    fn pause_then_resume_plays_resume_cue() {
        let mut h = Harness::new(false);
        h.machine.start();
        h.tick(10);
        h.machine.stop();

        assert_eq!(h.machine.run_state(), RunState::Paused);
        assert_eq!(h.machine.remaining_seconds(), 1490);

        h.machine.start();
        assert_eq!(h.cues(), vec![Cue::Start, Cue::Pause, Cue::Resume]);
        assert_eq!(h.ticker.0.lock().unwrap().starts, 2);
        assert_eq!(h.ticker.0.lock().unwrap().cancels, 1);
    }

    #[test]
    fn countdown_only_moves_while_running() {
        let mut h = Harness::new(false);
        let mut last = h.machine.remaining_seconds();

        for round in 0..5 {
            h.machine.start();
            h.tick(3);
            assert!(h.machine.remaining_seconds() <= last);
            last = h.machine.remaining_seconds();

            h.machine.stop();
            let paused_generation = h.generation();
            h.machine.on_tick(paused_generation);
            assert_eq!(h.machine.remaining_seconds(), last, "round {round}");
        }
        assert_eq!(last, 1500 - 15);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut h = Harness::new(false);
        h.machine.start();
        let old = h.generation();
        h.machine.stop();
        h.machine.start();

        h.machine.on_tick(old);
        assert_eq!(h.machine.remaining_seconds(), 1500);

        h.tick(1);
        assert_eq!(h.machine.remaining_seconds(), 1499);
    }

    #[test]
    fn reset_restores_full_duration_and_clears_started() {
        let mut h = Harness::new(false);
        h.machine.toggle_mode();
        h.machine.start();
        h.tick(42);

        h.machine.reset();
        assert_eq!(h.machine.phase(), Phase::ShortBreak);
        assert_eq!(h.machine.remaining_seconds(), 300);
        assert!(!h.machine.is_running());

        h.machine.start();
        assert_eq!(h.cues().last(), Some(&Cue::Start));
    }

    #[test]
    fn toggle_twice_restores_phase() {
        let mut h = Harness::new(false);
        h.machine.start();
        h.tick(5);

        h.machine.toggle_mode();
        assert_eq!(h.machine.phase(), Phase::ShortBreak);
        assert_eq!(h.machine.remaining_seconds(), 300);
        assert!(!h.machine.is_running());

        h.machine.toggle_mode();
        assert_eq!(h.machine.phase(), Phase::Work);
        assert_eq!(h.machine.remaining_seconds(), 1500);
        assert_eq!(h.cues(), vec![Cue::Start, Cue::Skip, Cue::Skip]);
    }

    #[test]
    fn work_completion_moves_to_break() {
        let mut h = Harness::new(false);
        h.machine.start();
        h.tick(1499);
        assert_eq!(h.machine.remaining_seconds(), 1);
        assert!(h.notes.0.lock().unwrap().is_empty());

        h.tick(1);
        assert_eq!(h.machine.phase(), Phase::ShortBreak);
        assert_eq!(h.machine.remaining_seconds(), 300);
        assert!(!h.machine.is_running());
        assert_eq!(h.cues().last(), Some(&Cue::WorkComplete));
        assert_eq!(
            *h.notes.0.lock().unwrap(),
            vec![(NOTIFICATION_TITLE.to_string(), "Time for a break.".to_string())]
        );
    }

    #[test]
    fn break_completion_moves_to_work() {
        let mut h = Harness::new(false);
        h.machine.toggle_mode();
        h.machine.start();
        h.tick(300);

        assert_eq!(h.machine.phase(), Phase::Work);
        assert_eq!(h.machine.remaining_seconds(), 1500);
        assert_eq!(h.cues().last(), Some(&Cue::BreakComplete));
        assert_eq!(h.notes.0.lock().unwrap()[0].1, "Back to work!");

        // a late tick from the finished countdown changes nothing
        h.tick(1);
        assert_eq!(h.machine.remaining_seconds(), 1500);
    }

    #[test]
    fn blocking_follows_work_session() {
        let mut h = Harness::new(true);

        h.machine.start();
        assert_eq!(h.executor.appends(), 1);
        assert!(h.machine.blocker().is_blocking());

        h.machine.toggle_mode();
        assert_eq!(h.executor.removals(), 1);
        assert_eq!(h.machine.phase(), Phase::ShortBreak);
        assert_eq!(h.machine.remaining_seconds(), 300);
        assert!(!h.machine.blocker().is_blocking());

        h.machine.end_session();
        assert_eq!(h.machine.phase(), Phase::Work);
        assert_eq!(h.machine.remaining_seconds(), 1500);
        assert!(!h.machine.blocker().is_blocking());
        assert_eq!(h.executor.removals(), 1);
        assert_eq!(h.cues().last(), Some(&Cue::Reset));
    }

    #[test]
    fn break_to_work_reenables_blocking() {
        let mut h = Harness::new(true);
        h.machine.toggle_mode();
        assert_eq!(h.executor.total(), 0);

        h.machine.start();
        h.tick(300);
        assert_eq!(h.machine.phase(), Phase::Work);
        assert!(h.machine.blocker().is_blocking());
        assert_eq!(h.executor.appends(), 1);
    }

    #[test]
    fn blocking_disabled_means_no_commands() {
        let mut h = Harness::new(false);
        h.machine.start();
        h.tick(1500);
        h.machine.toggle_mode();
        h.machine.end_session();
        assert_eq!(h.executor.total(), 0);
    }

    #[test]
    fn end_session_without_blocking_is_harmless() {
        let mut h = Harness::new(true);
        h.machine.end_session();
        assert_eq!(h.executor.total(), 0);
        assert_eq!(h.cues(), vec![Cue::Reset]);
    }

    #[test]
    fn end_session_disables_even_when_preference_turned_off() {
        let mut h = Harness::new(true);
        h.machine.start();
        h.machine.set_blocking_enabled(false);
        h.machine.end_session();
        assert!(!h.machine.blocker().is_blocking());
        assert_eq!(h.executor.removals(), 1);
    }

    #[test]
    fn shutdown_restores_hosts_and_cancels_countdown() {
        let mut h = Harness::new(true);
        h.machine.start();
        h.machine.shutdown();

        assert!(!h.machine.is_running());
        assert!(!h.machine.blocker().is_blocking());
        assert_eq!(h.executor.removals(), 1);
        assert_eq!(h.ticker.0.lock().unwrap().cancels, 1);
    }

    #[test]
    fn subscribers_see_every_change() {
        let mut h = Harness::new(false);
        let mut rx = h.machine.subscribe();
        assert_eq!(rx.borrow_and_update().remaining_seconds, 1500);

        h.machine.start();
        h.tick(1);
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.remaining_seconds, 1499);
        assert_eq!(snap.time_string, "24:59");
        assert_eq!(snap.state, RunState::Running);

        h.machine.add_to_whitelist("https://www.GitHub.com");
        assert_eq!(rx.borrow_and_update().whitelist, vec!["github.com"]);
    }

    #[test]
    fn audio_settings_switch_at_runtime() {
        let mut h = Harness::new(false);
        let mut rx = h.machine.subscribe();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.audio_mode, AudioMode::SoundAndVoice);
        assert_eq!(snap.language, Language::En);

        h.machine.set_audio_mode(AudioMode::SoundOnly);
        h.machine.set_language(Language::Es);

        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.audio_mode, AudioMode::SoundOnly);
        assert_eq!(snap.language, Language::Es);
        assert!(h.cues().is_empty());
    }

    #[test]
    fn whitelist_is_applied_on_next_enable() {
        let mut h = Harness::with_whitelist(true, &["youtube.com"]);
        h.machine.start();
        let scripts = h.executor.scripts.lock().unwrap().clone();
        assert!(scripts.iter().all(|s| !s.contains("youtube.com")));
    }
}
