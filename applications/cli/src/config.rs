/// Application configuration
use crate::error::{CliError, Result};
use aria_audio::EqPreset;
use aria_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "aria.toml";

/// Upper bound for `playback.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub audio: AudioSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioSettings {
    /// Equalizer preset enabled at startup
    #[serde(default)]
    pub equalizer_preset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Media ids are file paths or URLs
    #[default]
    Direct,
    /// Media ids are YouTube video ids, resolved with yt-dlp
    Ytdlp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverSettings {
    #[serde(default)]
    pub kind: ResolverKind,

    #[serde(default = "default_ytdlp_program")]
    pub program: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            kind: ResolverKind::default(),
            program: default_ytdlp_program(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ResolverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HistorySettings {
    /// JSON-lines play log; no history is kept when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from an optional TOML file, then `ARIA_*` environment variables
    ///
    /// An explicit `path` must exist; the default `aria.toml` is optional.
    /// Nested keys use a double underscore: `ARIA_PLAYBACK__MAX_RETRIES=3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("ARIA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.max_retries > MAX_RETRIES_LIMIT {
            return Err(CliError::Config(format!(
                "playback.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.playback.max_retries
            )));
        }

        if self.playback.initial_volume > 100 {
            return Err(CliError::Config(format!(
                "playback.initial_volume must be 0-100, got {}",
                self.playback.initial_volume
            )));
        }

        if self.playback.event_capacity == 0 {
            return Err(CliError::Config(
                "playback.event_capacity must be positive".to_string(),
            ));
        }

        if let Some(preset) = &self.audio.equalizer_preset {
            if EqPreset::from_name(preset).is_none() {
                return Err(CliError::Config(format!(
                    "unknown equalizer preset '{preset}' (see `aria presets`)"
                )));
            }
        }

        if self.resolver.kind == ResolverKind::Ytdlp {
            if self.resolver.timeout_secs == 0 {
                return Err(CliError::Config(
                    "resolver.timeout_secs must be positive".to_string(),
                ));
            }
            if self.resolver.program.as_os_str().is_empty() {
                return Err(CliError::Config("resolver.program is empty".to_string()));
            }
        }

        Ok(())
    }
}

fn default_ytdlp_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.playback.max_retries, 2);
        assert_eq!(config.resolver.kind, ResolverKind::Direct);
        assert!(config.history.path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
            [playback]
            max_retries = 4
            skip_delay = 250
            initial_volume = 55
            shuffle_seed = 7

            [audio]
            equalizer_preset = "Rock"

            [resolver]
            kind = "ytdlp"
            timeout_secs = 12

            [history]
            path = "plays.jsonl"
            "#,
        );

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.playback.max_retries, 4);
        assert_eq!(config.playback.skip_delay, Duration::from_millis(250));
        assert_eq!(config.playback.initial_volume, 55);
        assert_eq!(config.playback.shuffle_seed, Some(7));
        assert!(config.playback.visualizer_enabled);
        assert_eq!(config.audio.equalizer_preset.as_deref(), Some("Rock"));
        assert_eq!(config.resolver.kind, ResolverKind::Ytdlp);
        assert_eq!(config.resolver.timeout(), Duration::from_secs(12));
        assert_eq!(config.resolver.program, PathBuf::from("yt-dlp"));
        assert_eq!(config.history.path, Some(PathBuf::from("plays.jsonl")));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/aria.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_rejects_too_many_retries() {
        let mut config = AppConfig::default();
        config.playback.max_retries = 11;
        assert!(config.validate().is_err());

        config.playback.max_retries = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_volume_and_preset() {
        let mut config = AppConfig::default();
        config.playback.initial_volume = 101;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.equalizer_preset = Some("Polka".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_values_fail_load() {
        let file = write_config("[playback]\nmax_retries = 50\n");
        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
