use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub detect: DetectConfig,
    pub save: SaveConfig,
    #[serde(rename = "loop", default)]
    pub capture_loop: LoopConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub url: String,
    #[serde(default = "default_camera_mode")]
    pub mode: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConfig {
    pub url: String,
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,
}

/// Timing knobs for the detection loop. The defaults mirror the observed
/// capture behavior: sample twice a second, allow an automatic capture at
/// most every three seconds, and hold a "captured" confirmation for two.
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    #[serde(default = "default_status_revert")]
    pub status_revert_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            cooldown_ms: default_cooldown(),
            status_revert_ms: default_status_revert(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot honor. A zero poll interval would
    /// panic the interval timer deep inside the loop; fail at startup
    /// instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_loop.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "loop.poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_camera_mode() -> String {
    "mjpeg".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_static_prefix() -> String {
    "/static".into()
}
fn default_poll_interval() -> u64 {
    500
}
fn default_cooldown() -> u64 {
    3000
}
fn default_status_revert() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let toml = r#"
            [camera]
            url = "http://localhost:8080/stream"

            [detect]
            url = "http://localhost:5000/detect"

            [save]
            url = "http://localhost:5000/save"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.camera.mode, "mjpeg");
        assert_eq!(config.camera.connect_timeout_secs, 10);
        assert_eq!(config.save.static_prefix, "/static");
        assert_eq!(config.capture_loop.poll_interval_ms, 500);
        assert_eq!(config.capture_loop.cooldown_ms, 3000);
        assert_eq!(config.capture_loop.status_revert_ms, 2000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn overrides_are_honored() {
        let toml = r#"
            [camera]
            url = "http://cam/frame"
            mode = "still"

            [detect]
            url = "http://srv/detect"

            [save]
            url = "http://srv/save"
            static_prefix = "/media"

            [loop]
            poll_interval_ms = 250
            cooldown_ms = 5000

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.camera.mode, "still");
        assert_eq!(config.save.static_prefix, "/media");
        assert_eq!(config.capture_loop.poll_interval_ms, 250);
        assert_eq!(config.capture_loop.cooldown_ms, 5000);
        // unset keys inside a present [loop] table still default
        assert_eq!(config.capture_loop.status_revert_ms, 2000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let toml = r#"
            [camera]
            url = "http://cam/stream"

            [detect]
            url = "http://srv/detect"

            [save]
            url = "http://srv/save"

            [loop]
            poll_interval_ms = 0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn default_timing_values_validate() {
        let toml = r#"
            [camera]
            url = "http://cam/stream"

            [detect]
            url = "http://srv/detect"

            [save]
            url = "http://srv/save"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_required_section_is_an_error() {
        let toml = r#"
            [camera]
            url = "http://cam/stream"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
