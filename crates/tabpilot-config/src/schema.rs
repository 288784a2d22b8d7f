//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to reach the controlled browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome remote debugging port.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Launch Chrome headless when we have to start it ourselves.
    #[serde(default)]
    pub headless: bool,

    /// Profile directory for a browser we launch.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Explicit browser executable; auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            headless: false,
            profile_dir: None,
            chrome_path: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserConfig {
    /// Get the profile directory, falling back to `~/.tabpilot/browser-profile`.
    pub fn get_profile_dir(&self) -> PathBuf {
        self.profile_dir
            .clone()
            .unwrap_or_else(|| tabpilot_dir().join("browser-profile"))
    }

    /// Get the CDP HTTP endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }
}

fn default_debug_port() -> u16 {
    9222
}

fn default_window_width() -> u32 {
    1024
}

fn default_window_height() -> u32 {
    768
}

/// Timings and behaviour of the command execution loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wait after every command before the result screenshot.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Wait after focusing the controlled tab.
    #[serde(default = "default_activation_settle_ms")]
    pub activation_settle_ms: u64,

    /// Upper bound for the load-complete wait of a navigation.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Wait after a navigation completed, before page checks run.
    #[serde(default = "default_post_navigation_settle_ms")]
    pub post_navigation_settle_ms: u64,

    #[serde(default = "default_screenshot_max_attempts")]
    pub screenshot_max_attempts: u32,

    /// Backoff base for rate-limited captures (`base * 2^attempt`).
    #[serde(default = "default_screenshot_backoff_base_ms")]
    pub screenshot_backoff_base_ms: u64,

    /// Wait between scrolling an element into view and clicking it.
    #[serde(default = "default_click_settle_ms")]
    pub click_settle_ms: u64,

    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Re-inject the visual cursor indicator after navigations.
    #[serde(default = "default_true")]
    pub cursor_overlay: bool,

    /// Query URL prefix used when a navigation target is not a domain.
    #[serde(default = "default_search_engine_url")]
    pub search_engine_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            activation_settle_ms: default_activation_settle_ms(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            post_navigation_settle_ms: default_post_navigation_settle_ms(),
            screenshot_max_attempts: default_screenshot_max_attempts(),
            screenshot_backoff_base_ms: default_screenshot_backoff_base_ms(),
            click_settle_ms: default_click_settle_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            cursor_overlay: true,
            search_engine_url: default_search_engine_url(),
        }
    }
}

impl EngineConfig {
    /// Zero every wait. Used by tests and dry runs.
    pub fn without_delays() -> Self {
        Self {
            settle_ms: 0,
            activation_settle_ms: 0,
            post_navigation_settle_ms: 0,
            screenshot_backoff_base_ms: 0,
            click_settle_ms: 0,
            scroll_settle_ms: 0,
            ..Self::default()
        }
    }
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_activation_settle_ms() -> u64 {
    500
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_post_navigation_settle_ms() -> u64 {
    1000
}

fn default_screenshot_max_attempts() -> u32 {
    3
}

fn default_screenshot_backoff_base_ms() -> u64 {
    500
}

fn default_click_settle_ms() -> u64 {
    300
}

fn default_scroll_settle_ms() -> u64 {
    500
}

fn default_search_engine_url() -> String {
    "https://www.google.com/search?q=".to_string()
}

/// Vision backend used as the last element-resolution tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_vision_model")]
    pub model: String,

    /// Matches must score strictly above this to be clicked by coordinates.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_vision_endpoint(),
            model: default_vision_model(),
            confidence_threshold: default_confidence_threshold(),
            timeout_secs: default_vision_timeout_secs(),
        }
    }
}

fn default_vision_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_vision_model() -> String {
    "llama3.2-vision".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_vision_timeout_secs() -> u64 {
    60
}

/// Session recovery across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remember the controlled tab id on disk.
    #[serde(default = "default_true")]
    pub persist: bool,

    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            state_file: None,
        }
    }
}

impl SessionConfig {
    pub fn get_state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| tabpilot_dir().join("state.json"))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn get_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| tabpilot_dir().join("logs"))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// `~/.tabpilot`, or `./.tabpilot` when no home directory is known.
pub fn tabpilot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabpilot")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
