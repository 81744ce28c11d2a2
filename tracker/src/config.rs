//! TOML configuration
//!
//! `config.toml` is required; a `config.local.toml` next to it is optional
//! and its keys override the base file.

use crate::penalty::PenaltyRules;
use crate::pit_lane::PitLaneConfig;
use crate::session::SessionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:29998";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tracker: TrackerSection,
    pub pit_lane: PitLaneSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerSection {
    /// UDP address decoded packets are received on
    pub listen: String,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PitLaneSection {
    /// Leave unset to disable speed limit enforcement
    pub speed_limit_kmh: Option<f64>,
    pub overspeed_margin_kmh: f64,
    pub final_laps_window: u32,
    pub settle_delay_ms: u64,
    pub message_timeout_ms: u64,
    pub pit_start_circle: u8,
}

impl Default for PitLaneSection {
    fn default() -> Self {
        Self {
            speed_limit_kmh: None,
            overspeed_margin_kmh: 20.0,
            final_laps_window: 2,
            settle_delay_ms: 500,
            message_timeout_ms: 3000,
            pit_start_circle: 1,
        }
    }
}

impl Config {
    /// Loads `path` and its optional `.local.toml` overlay
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut table = read_table(path)?;

        let overlay_path = path.with_extension("local.toml");
        if overlay_path.exists() {
            merge(&mut table, read_table(&overlay_path)?);
        }

        let config: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limit) = self.pit_lane.speed_limit_kmh {
            if !(0.0..=1000.0).contains(&limit) {
                return Err(ConfigError::Invalid(format!(
                    "pit_lane.speed_limit_kmh must be between 0 and 1000, got {}",
                    limit
                )));
            }
        }

        if self.pit_lane.overspeed_margin_kmh <= 0.0 {
            return Err(ConfigError::Invalid(
                "pit_lane.overspeed_margin_kmh must be positive".to_string(),
            ));
        }

        if self.tracker.listen.is_empty() {
            return Err(ConfigError::Invalid("tracker.listen must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let pit_lane = &self.pit_lane;

        SessionConfig {
            penalty_rules: pit_lane.speed_limit_kmh.map(|speed_limit_kmh| PenaltyRules {
                speed_limit_kmh,
                overspeed_margin_kmh: pit_lane.overspeed_margin_kmh,
                final_laps_window: pit_lane.final_laps_window,
            }),
            pit_lane: PitLaneConfig {
                settle_delay: Duration::from_millis(pit_lane.settle_delay_ms),
                message_timeout: Duration::from_millis(pit_lane.message_timeout_ms),
                pit_start_circle: pit_lane.pit_start_circle,
            },
        }
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    text.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.tracker.listen, DEFAULT_LISTEN);
        assert_eq!(config.pit_lane.speed_limit_kmh, None);
        assert!(config.session_config().penalty_rules.is_none());
        assert_eq!(
            config.session_config().pit_lane.settle_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_parse_pit_lane_section() {
        let config = Config::from_toml(
            r#"
            [tracker]
            listen = "0.0.0.0:30000"

            [pit_lane]
            speed_limit_kmh = 80
            overspeed_margin_kmh = 15.5
            settle_delay_ms = 0
            "#,
        )
        .unwrap();

        let rules = config.session_config().penalty_rules.unwrap();
        assert_approx_eq!(rules.speed_limit_kmh, 80.0);
        assert_approx_eq!(rules.overspeed_margin_kmh, 15.5);
        assert_eq!(rules.final_laps_window, 2);
        assert_eq!(config.session_config().pit_lane.settle_delay, Duration::ZERO);
        assert_eq!(config.tracker.listen, "0.0.0.0:30000");
    }

    #[test]
    fn test_invalid_speed_limit() {
        let result = Config::from_toml("[pit_lane]\nspeed_limit_kmh = 1500.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = Config::from_toml("[pit_lane]\nspeed_limit = 60.0\n");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/pitlane/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_local_overlay() {
        let dir = std::env::temp_dir().join(format!("pitlane-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("config.toml");
        let local = dir.join("config.local.toml");

        let mut file = std::fs::File::create(&base).unwrap();
        writeln!(file, "[pit_lane]\nspeed_limit_kmh = 60.0\nfinal_laps_window = 3").unwrap();
        let mut file = std::fs::File::create(&local).unwrap();
        writeln!(file, "[pit_lane]\nspeed_limit_kmh = 50.0").unwrap();

        let config = Config::load(&base).unwrap();
        assert_eq!(config.pit_lane.speed_limit_kmh, Some(50.0));
        assert_eq!(config.pit_lane.final_laps_window, 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
