use anyhow::{Context, Result};
use std::time::Duration;

use crate::audio::session::{SessionSettings, MAX_VOLUME, MIN_VOLUME};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers slash commands in one guild only

    // Audio
    pub default_volume: u8,
    pub max_queue_size: usize,

    // Sessions
    pub idle_timeout: Duration,
    pub progress_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("DEFAULT_VOLUME must be an integer")?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE must be an integer")?,

            // Sessions
            idle_timeout: parse_duration("IDLE_TIMEOUT", "5m")?,
            progress_interval: parse_duration("PROGRESS_INTERVAL", "1s")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 1 and 100
    /// - Queue size must be greater than 0
    /// - Idle timeout and progress interval must be non-zero
    pub fn validate(&self) -> Result<()> {
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between {} and {}, got: {}",
                MIN_VOLUME,
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.progress_interval.is_zero() {
            anyhow::bail!("Progress interval must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands in {}\n  \
            Audio: {}% vol, {} queue\n  \
            Sessions: {} idle timeout, {} progress interval",
            self.guild_id
                .map_or("all guilds".to_string(), |id| format!("guild {}", id)),
            self.default_volume,
            self.max_queue_size,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.progress_interval),
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            idle_timeout: self.idle_timeout,
            progress_interval: self.progress_interval,
        }
    }
}

fn parse_duration(var: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(&raw)
        .with_context(|| format!("{} must be a duration like '5m' or '30s', got '{}'", var, raw))
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let session = SessionSettings::default();

        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: session.default_volume,
            max_queue_size: session.max_queue_size,

            idle_timeout: session.idle_timeout,
            progress_interval: session.progress_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.default_volume, 50);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.progress_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_out_of_range_volume() {
        for volume in [0, 101, 255] {
            let config = Config {
                default_volume: volume,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "volume {volume} accepted");
        }
    }

    #[test]
    fn rejects_zero_limits() {
        let zero_queue = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        assert!(zero_queue.validate().is_err());

        let zero_timeout = Config {
            idle_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(zero_timeout.validate().is_err());

        let zero_interval = Config {
            progress_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(1234),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 1234"));
        assert!(summary.contains("5m idle timeout"));
    }

    #[test]
    fn session_settings_follow_config() {
        let config = Config {
            default_volume: 80,
            max_queue_size: 10,
            idle_timeout: Duration::from_secs(60),
            ..Config::default()
        };
        let settings = config.session_settings();
        assert_eq!(settings.default_volume, 80);
        assert_eq!(settings.max_queue_size, 10);
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn parses_human_durations() {
        assert_eq!(
            humantime::parse_duration("2m 30s").unwrap(),
            Duration::from_secs(150)
        );
        assert!(parse_duration("JUKEBOX_TEST_UNSET_DURATION", "nope").is_err());
        assert_eq!(
            parse_duration("JUKEBOX_TEST_UNSET_DURATION", "45s").unwrap(),
            Duration::from_secs(45)
        );
    }
}
