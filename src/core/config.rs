use crate::errors::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub retry: RetryConfig,
    pub wait: WaitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    /// Explicit browser binary; autodetected when unset.
    pub chrome_path: Option<String>,
    /// How long the backend keeps an idle connection open.
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One schedule per kind of operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub element: ScheduleConfig,
    pub click: ScheduleConfig,
    pub window: ScheduleConfig,
    pub frame: ScheduleConfig,
    pub assertion: ScheduleConfig,
}

/// Serialized form of a [`RetrySchedule`](crate::retry::RetrySchedule).
///
/// A negative `timeout_ms` retries indefinitely. A negative `delay_ms` is
/// rejected when the schedule is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub timeout_ms: i64,
    pub min_tries: u32,
    pub delay_ms: i64,
    /// Multiplier applied to `delay_ms` after every failure. `None` keeps a
    /// fixed delay.
    pub backoff_factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BrowserError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            chrome_path: None,
            idle_timeout_ms: 30000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            element: ScheduleConfig::default(),
            click: ScheduleConfig::default(),
            window: ScheduleConfig::default(),
            frame: ScheduleConfig::default(),
            assertion: ScheduleConfig {
                timeout_ms: 2000,
                ..ScheduleConfig::default()
            },
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            min_tries: 10,
            delay_ms: 0,
            backoff_factor: None,
            max_delay_ms: None,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.viewport.width, 1280);
        assert_eq!(config.retry.element.timeout_ms, 10000);
        assert_eq!(config.retry.element.min_tries, 10);
        assert_eq!(config.retry.assertion.timeout_ms, 2000);
        assert_eq!(config.wait.poll_interval_ms, 250);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{
                "browser": { "headless": false },
                "retry": { "click": { "timeout_ms": -1, "delay_ms": 50 } },
                "wait": { "poll_interval_ms": 10 }
            }"#,
        )
        .unwrap();

        assert!(!config.browser.headless);
        assert_eq!(config.browser.viewport.height, 720);
        assert_eq!(config.retry.click.timeout_ms, -1);
        assert_eq!(config.retry.click.delay_ms, 50);
        assert_eq!(config.retry.click.min_tries, 10);
        assert_eq!(config.retry.assertion.timeout_ms, 2000);
        assert_eq!(config.wait.poll_interval_ms, 10);
    }

    #[test]
    fn test_invalid_json_is_a_config_error() {
        let err = Config::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "browser": {{ "args": ["--mute-audio"] }} }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.browser.args, vec!["--mute-audio".to_string()]);

        let missing = Config::from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(missing.kind(), crate::errors::ErrorKind::Config);
    }
}
