use std::process::{Command, Stdio};

use super::cues::{AudioOutput, Language, Sound};
use crate::config::AudioConfig;

/// Plays sounds and speech by spawning external programs (`afplay`/`say`,
/// `canberra-gtk-play`/`spd-say`, or whatever the config names).
#[derive(Debug, Clone)]
pub struct CommandAudio {
    sound_command: Vec<String>,
    speech_command: Vec<String>,
}

impl CommandAudio {
    pub fn new(sound_command: Vec<String>, speech_command: Vec<String>) -> Self {
        Self {
            sound_command,
            speech_command,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.sound_command.clone(), config.speech_command.clone())
    }
}

/// Maps a 0.0..=1.0 value onto the -100..=100 scale `spd-say` expects.
fn percent(value: f32) -> i32 {
    (value.clamp(0.0, 1.0) * 200.0 - 100.0).round() as i32
}

/// Maps a 0.0..=1.0 rate onto words per minute for `say -r`; 0.5 is 180.
fn words_per_minute(rate: f32) -> u32 {
    (90.0 + rate.clamp(0.0, 1.0) * 180.0).round() as u32
}

fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter()
                .fold(arg.clone(), |acc, (key, value)| acc.replace(*key, value))
        })
        .collect()
}

fn spawn_detached(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            // reap in the background so the caller never waits on playback
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => tracing::warn!(program = %program, error = %e, "failed to spawn audio command"),
    }
}

impl AudioOutput for CommandAudio {
    fn play_sound(&self, sound: Sound) {
        let argv = substitute(
            &self.sound_command,
            &[("{sound}", sound.name()), ("{event}", sound.event_id())],
        );
        spawn_detached(&argv);
    }

    fn speak(&self, text: &str, language: Language, rate: f32, volume: f32) {
        let rate_pct = percent(rate).to_string();
        let volume_pct = percent(volume).to_string();
        let rate_wpm = words_per_minute(rate).to_string();
        let argv = substitute(
            &self.speech_command,
            &[
                ("{text}", text),
                ("{voice}", language.voice_identifier()),
                ("{voice_name}", language.voice_name()),
                ("{lang}", language.code()),
                ("{rate_pct}", &rate_pct),
                ("{rate_wpm}", &rate_wpm),
                ("{volume_pct}", &volume_pct),
            ],
        );
        spawn_detached(&argv);
    }
}
