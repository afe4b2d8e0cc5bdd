use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("counter thresholds must satisfy 0 <= down_below < up_above <= 180 (got {down_below}, {up_above})")]
    InvalidThresholds { down_below: f32, up_above: f32 },
    #[error("min_confidence must be within [0, 1] (got {0})")]
    InvalidConfidence(f32),
    #[error("model input_size must be positive")]
    InvalidInputSize,
    #[error("quit_key must be a single ASCII character (got {0:?})")]
    InvalidQuitKey(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub device: i32,
    /// Video file or stream URL. Takes precedence over `device`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            url: None,
            width: None,
            height: None,
        }
    }
}

fn default_model_path() -> String {
    "models/pose.onnx".to_string()
}

fn default_input_size() -> u32 {
    192
}

fn default_intra_threads() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            input_size: default_input_size(),
            intra_threads: default_intra_threads(),
        }
    }
}

fn default_down_below() -> f32 {
    70.0
}

fn default_up_above() -> f32 {
    140.0
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_min_confidence() -> f32 {
    0.2
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_down_below")]
    pub down_below: f32,
    #[serde(default = "default_up_above")]
    pub up_above: f32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl CounterConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            down_below: default_down_below(),
            up_above: default_up_above(),
            debounce_ms: default_debounce_ms(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_display_enabled() -> bool {
    true
}

fn default_title() -> String {
    "repcount".to_string()
}

fn default_quit_key() -> String {
    "q".to_string()
}

fn default_frame_delay_ms() -> u64 {
    80
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_quit_key")]
    pub quit_key: String,
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
}

impl DisplayConfig {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    /// Quit key as the lowercase key code reported by the window.
    pub fn quit_key_code(&self) -> i32 {
        self.quit_key
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase() as i32)
            .unwrap_or('q' as i32)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: default_display_enabled(),
            title: default_title(),
            quit_key: default_quit_key(),
            frame_delay_ms: default_frame_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        if !Path::new(DEFAULT_CONFIG_PATH).exists() {
            tracing::info!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.counter;
        if !(0.0..=180.0).contains(&c.down_below)
            || !(0.0..=180.0).contains(&c.up_above)
            || c.down_below >= c.up_above
        {
            return Err(ConfigError::InvalidThresholds {
                down_below: c.down_below,
                up_above: c.up_above,
            });
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(ConfigError::InvalidConfidence(c.min_confidence));
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::InvalidInputSize);
        }
        let key = &self.display.quit_key;
        if key.chars().count() != 1 || !key.is_ascii() {
            return Err(ConfigError::InvalidQuitKey(key.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.camera.device, 0);
        assert!(config.camera.url.is_none());
        assert_eq!(config.model.path, "models/pose.onnx");
        assert_eq!(config.model.input_size, 192);
        assert_eq!(config.counter.down_below, 70.0);
        assert_eq!(config.counter.up_above, 140.0);
        assert_eq!(config.counter.debounce(), Duration::from_millis(500));
        assert_eq!(config.counter.min_confidence, 0.2);
        assert!(config.display.enabled);
        assert_eq!(config.display.frame_delay(), Duration::from_millis(80));
        assert_eq!(config.display.quit_key_code(), 'q' as i32);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [camera]
            url = "squats.mp4"

            [counter]
            debounce_ms = 300

            [display]
            enabled = false
            quit_key = "X"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.url.as_deref(), Some("squats.mp4"));
        assert_eq!(config.counter.debounce_ms, 300);
        assert_eq!(config.counter.up_above, 140.0);
        assert!(!config.display.enabled);
        assert_eq!(config.display.quit_key_code(), 'x' as i32);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = Config::parse("[counter]\ndown_below = 150.0\nup_above = 100.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThresholds { .. }));
    }

    #[test]
    fn test_rejects_bad_confidence_and_key() {
        assert!(matches!(
            Config::parse("[counter]\nmin_confidence = 1.5\n").unwrap_err(),
            ConfigError::InvalidConfidence(_)
        ));
        assert!(matches!(
            Config::parse("[display]\nquit_key = \"esc\"\n").unwrap_err(),
            ConfigError::InvalidQuitKey(_)
        ));
        assert!(matches!(
            Config::parse("[model]\ninput_size = 0\n").unwrap_err(),
            ConfigError::InvalidInputSize
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\npath = \"https://example.com/movenet.onnx\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.model.path, "https://example.com/movenet.onnx");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from("/nonexistent/repcount.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
