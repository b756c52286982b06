//! Scanner configuration stored in `buildscan.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::retry::Poll;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "buildscan.toml";

/// Scanner configuration (TOML).
///
/// Edited by humans; missing fields default to values that work against a
/// typical hosted instance over a normal connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// WebDriver endpoint (chromedriver).
    pub webdriver_url: String,

    pub headless: bool,

    /// Chrome profile directory. A fresh temporary profile is used when unset.
    pub user_data_dir: Option<PathBuf>,

    /// Directory receiving reports and snapshots.
    pub output_dir: PathBuf,

    /// Model type prefix that marks runtime-defined models.
    pub dynamic_type_prefix: String,

    pub timeouts: TimeoutConfig,

    pub scroll: ScrollConfig,
}

/// Wait bounds in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long the human has to log in.
    pub login: u64,
    pub navigation: u64,
    pub element: u64,
    /// Open/close of the theme configuration modal.
    pub modal: u64,
    /// Workflow state and method listings.
    pub listing: u64,
    pub poll_interval: u64,
    /// Pause after a rejected model count before re-measuring.
    pub settle: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScrollConfig {
    pub step_px: u64,
    pub pause_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            user_data_dir: None,
            output_dir: PathBuf::from("."),
            dynamic_type_prefix: "MacModelTypeDyn".to_string(),
            timeouts: TimeoutConfig::default(),
            scroll: ScrollConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login: 5 * 60 * 1000,
            navigation: 10_000,
            element: 10_000,
            modal: 10_000,
            listing: 8_000,
            poll_interval: 250,
            settle: 2_000,
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 400,
            pause_ms: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn poll(&self, timeout_ms: u64) -> Poll {
        Poll::new(
            Duration::from_millis(self.poll_interval),
            Duration::from_millis(timeout_ms),
        )
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle)
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.webdriver_url.trim().is_empty() {
            return Err(anyhow!("webdriver_url must be non-empty"));
        }
        if self.dynamic_type_prefix.trim().is_empty() {
            return Err(anyhow!("dynamic_type_prefix must be non-empty"));
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("timeouts.login", t.login),
            ("timeouts.navigation", t.navigation),
            ("timeouts.element", t.element),
            ("timeouts.modal", t.modal),
            ("timeouts.listing", t.listing),
            ("timeouts.poll_interval", t.poll_interval),
            ("timeouts.settle", t.settle),
            ("scroll.pause_ms", self.scroll.pause_ms),
        ] {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if self.scroll.step_px == 0 {
            return Err(anyhow!("scroll.step_px must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ScanConfig::default()`.
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    if !path.exists() {
        let cfg = ScanConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ScanConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ScanConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ScanConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("buildscan.toml");
        let cfg = ScanConfig {
            headless: true,
            user_data_dir: Some(PathBuf::from("/tmp/profile")),
            ..ScanConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("buildscan.toml");
        fs::write(&path, "[timeouts]\nlisting = 1500\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.timeouts.listing, 1500);
        assert_eq!(cfg.timeouts.modal, TimeoutConfig::default().modal);
        assert_eq!(cfg.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("buildscan.toml");
        fs::write(&path, "[timeouts]\nmodal = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timeouts.modal must be > 0"));
    }

    #[test]
    fn zero_settle_and_scroll_pause_are_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.timeouts.settle = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.to_string(), "timeouts.settle must be > 0");

        let mut cfg = ScanConfig::default();
        cfg.scroll.pause_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.to_string(), "scroll.pause_ms must be > 0");
    }
}
