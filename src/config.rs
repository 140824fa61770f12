use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::audio::cues::{AudioMode, Language};
use crate::error::ConfigError;

pub const APP_DIR: &str = "pomofocus";
const CONFIG_FILE: &str = "config.toml";
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub blocking: BlockingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub mode: AudioMode,
    pub language: Language,
    /// 0.0 (slowest) .. 1.0 (fastest)
    pub speech_rate: f32,
    pub volume: f32,
    /// Argument vector for playing a sound; `{sound}` and `{event}` are substituted.
    /// Empty disables sounds.
    pub sound_command: Vec<String>,
    /// Argument vector for speech; `{text}`, `{voice}` (locale), `{voice_name}`
    /// (macOS voice), `{lang}`, `{rate_pct}`, `{rate_wpm}` and `{volume_pct}`
    /// are substituted. Empty disables speech.
    pub speech_command: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let (sound_command, speech_command) = if cfg!(target_os = "macos") {
            (
                vec!["afplay".into(), "/System/Library/Sounds/{sound}.aiff".into()],
                vec![
                    "say".into(),
                    "-v".into(),
                    "{voice_name}".into(),
                    "-r".into(),
                    "{rate_wpm}".into(),
                    "{text}".into(),
                ],
            )
        } else {
            (
                vec!["canberra-gtk-play".into(), "--id={event}".into()],
                vec![
                    "spd-say".into(),
                    "-l".into(),
                    "{lang}".into(),
                    "-r".into(),
                    "{rate_pct}".into(),
                    "-i".into(),
                    "{volume_pct}".into(),
                    "{text}".into(),
                ],
            )
        };
        Self {
            mode: AudioMode::default(),
            language: Language::default(),
            speech_rate: 0.5,
            volume: 0.8,
            sound_command,
            speech_command,
        }
    }
}

/// How elevated hosts-file commands are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    /// `osascript` on macOS, `pkexec` elsewhere.
    #[default]
    Auto,
    Pkexec,
    Sudo,
    Osascript,
    /// Run through `sh -c` directly; for daemons that already run as root.
    Direct,
}

impl Elevation {
    pub fn resolve(self) -> Elevation {
        match self {
            Elevation::Auto if cfg!(target_os = "macos") => Elevation::Osascript,
            Elevation::Auto => Elevation::Pkexec,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockingConfig {
    /// Initial value of the "block sites during work" toggle.
    pub enabled: bool,
    pub hosts_path: PathBuf,
    pub redirect_ip: String,
    pub elevation: Elevation,
    pub flush_dns_command: String,
    /// Added to the built-in block list.
    pub extra_sites: Vec<String>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        let flush_dns_command = if cfg!(target_os = "macos") {
            "dscacheutil -flushcache; killall -HUP mDNSResponder 2>/dev/null || true"
        } else {
            "resolvectl flush-caches 2>/dev/null || true"
        };
        Self {
            enabled: false,
            hosts_path: PathBuf::from("/etc/hosts"),
            redirect_ip: "127.0.0.1".to_string(),
            elevation: Elevation::Auto,
            flush_dns_command: flush_dns_command.to_string(),
            extra_sites: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: SocketAddr::from(([127, 0, 0, 1], 8765)),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `path` is `None`.
    /// A missing default file yields the built-in defaults; a missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_dir()?.join(CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Config::parse(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(raw: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(raw)
    }
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn preferences_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(PREFERENCES_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.blocking.redirect_ip, "127.0.0.1");
        assert_eq!(config.server.listen.port(), 8765);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [audio]
            mode = "sound_only"
            language = "es"

            [blocking]
            enabled = true
            elevation = "direct"
            extra_sites = ["news.ycombinator.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.mode, AudioMode::SoundOnly);
        assert_eq!(config.audio.language, Language::Es);
        assert_eq!(config.audio.volume, 0.8);
        assert!(config.blocking.enabled);
        assert_eq!(config.blocking.elevation, Elevation::Direct);
        assert_eq!(config.blocking.hosts_path, PathBuf::from("/etc/hosts"));
        assert_eq!(config.blocking.extra_sites, vec!["news.ycombinator.com"]);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[blocking]\nenabled = \"yes\"\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn auto_elevation_resolves_per_platform() {
        let resolved = Elevation::Auto.resolve();
        if cfg!(target_os = "macos") {
            assert_eq!(resolved, Elevation::Osascript);
        } else {
            assert_eq!(resolved, Elevation::Pkexec);
        }
        assert_eq!(Elevation::Sudo.resolve(), Elevation::Sudo);
    }
}
