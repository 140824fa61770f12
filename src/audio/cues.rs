use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    SoundOnly,
    #[default]
    SoundAndVoice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }

    pub fn voice_identifier(&self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::Es => "es-ES",
        }
    }

    /// Stock macOS voice for `say -v`.
    pub fn voice_name(&self) -> &'static str {
        match self {
            Language::En => "Samantha",
            Language::Es => "Monica",
        }
    }
}

/// Feedback event tied to a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    Pause,
    Resume,
    WorkComplete,
    BreakComplete,
    Reset,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sound {
    Blow,
    Pop,
    Glass,
    Hero,
    Tink,
    Morse,
}

impl Sound {
    /// macOS system sound name.
    pub fn name(&self) -> &'static str {
        match self {
            Sound::Blow => "Blow",
            Sound::Pop => "Pop",
            Sound::Glass => "Glass",
            Sound::Hero => "Hero",
            Sound::Tink => "Tink",
            Sound::Morse => "Morse",
        }
    }

    /// Closest freedesktop sound theme event id.
    pub fn event_id(&self) -> &'static str {
        match self {
            Sound::Blow => "service-login",
            Sound::Pop => "message",
            Sound::Glass => "complete",
            Sound::Hero => "bell",
            Sound::Tink => "dialog-information",
            Sound::Morse => "window-attention",
        }
    }
}

impl Cue {
    pub fn sound(&self) -> Sound {
        match self {
            Cue::Start => Sound::Blow,
            Cue::Pause | Cue::Resume => Sound::Pop,
            Cue::WorkComplete => Sound::Glass,
            Cue::BreakComplete => Sound::Hero,
            Cue::Reset => Sound::Tink,
            Cue::Skip => Sound::Morse,
        }
    }

    /// Spoken line, if this cue has one. Reset and Skip are sound-only.
    pub fn message(&self, language: Language) -> Option<&'static str> {
        let text = match (self, language) {
            (Cue::Start, Language::En) => "Focus time started. Let's go!",
            (Cue::Start, Language::Es) => "Tiempo de enfoque iniciado. ¡Vamos!",
            (Cue::Pause, Language::En) => "Timer paused",
            (Cue::Pause, Language::Es) => "Temporizador pausado",
            (Cue::Resume, Language::En) => "Timer resumed",
            (Cue::Resume, Language::Es) => "Temporizador reanudado",
            (Cue::WorkComplete, Language::En) => "Great work! Time for a break.",
            (Cue::WorkComplete, Language::Es) => "¡Buen trabajo! Es hora de descansar.",
            (Cue::BreakComplete, Language::En) => "Break is over. Ready to focus?",
            (Cue::BreakComplete, Language::Es) => "El descanso terminó. ¿Listo para enfocarte?",
            (Cue::Reset | Cue::Skip, _) => return None,
        };
        Some(text)
    }
}

pub trait CueSink: Send {
    fn play(&self, cue: Cue);
    fn mode(&self) -> AudioMode;
    fn language(&self) -> Language;
    fn set_mode(&mut self, mode: AudioMode);
    fn set_language(&mut self, language: Language);
}

/// Sound and speech backend. Both calls are fire-and-forget.
pub trait AudioOutput: Send {
    fn play_sound(&self, sound: Sound);
    fn speak(&self, text: &str, language: Language, rate: f32, volume: f32);
}

pub struct Announcer<O> {
    output: O,
    mode: AudioMode,
    language: Language,
    rate: f32,
    volume: f32,
}

impl<O: AudioOutput> Announcer<O> {
    pub fn new(output: O, mode: AudioMode, language: Language) -> Self {
        Self {
            output,
            mode,
            language,
            rate: 0.5,
            volume: 0.8,
        }
    }

    pub fn with_voice(mut self, rate: f32, volume: f32) -> Self {
        self.rate = rate.clamp(0.0, 1.0);
        self.volume = volume.clamp(0.0, 1.0);
        self
    }
}

impl<O: AudioOutput> CueSink for Announcer<O> {
    fn play(&self, cue: Cue) {
        tracing::debug!(?cue, "cue");
        self.output.play_sound(cue.sound());
        if self.mode == AudioMode::SoundAndVoice {
            if let Some(text) = cue.message(self.language) {
                self.output
                    .speak(text, self.language, self.rate, self.volume);
            }
        }
    }

    fn mode(&self) -> AudioMode {
        self.mode
    }

    fn language(&self) -> Language {
        self.language
    }

    fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
    }

    fn set_language(&mut self, language: Language) {
        self.language = language;
    }
}
