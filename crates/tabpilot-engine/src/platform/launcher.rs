//! Chrome discovery and process management.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tabpilot_config::BrowserConfig;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::PlatformError;

/// Polls of the debug endpoint while a freshly launched Chrome boots.
const STARTUP_POLL_ATTEMPTS: u32 = 30;
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Starts Chrome with remote debugging and owns the child process.
pub struct ChromeLauncher {
    config: BrowserConfig,
    /// Chrome process handle (if we launched it).
    process: Mutex<Option<Child>>,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
        }
    }

    /// Find Chrome executable path.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Check if Chrome is already answering on the debug port.
    pub async fn is_running(&self) -> bool {
        reqwest::get(&format!("{}/json/version", self.config.endpoint()))
            .await
            .is_ok()
    }

    /// Make sure a debuggable Chrome is listening, launching one if needed.
    pub async fn ensure_running(&self) -> Result<(), PlatformError> {
        if self.is_running().await {
            info!("Chrome already running on port {}", self.config.debug_port);
            return Ok(());
        }

        info!(
            "Chrome not running on port {}, launching...",
            self.config.debug_port
        );
        let child = self.launch().await?;
        *self.process.lock().await = Some(child);

        for _ in 0..STARTUP_POLL_ATTEMPTS {
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
            if self.is_running().await {
                return Ok(());
            }
        }

        Err(PlatformError::LaunchFailed(
            "Chrome failed to start within timeout".to_string(),
        ))
    }

    /// Launch Chrome with remote debugging enabled.
    async fn launch(&self) -> Result<Child, PlatformError> {
        let chrome_path = match &self.config.chrome_path {
            Some(path) => path.clone(),
            None => Self::find_chrome().ok_or(PlatformError::ChromeNotFound)?,
        };
        let profile_dir = self.config.get_profile_dir();

        if let Err(e) = std::fs::create_dir_all(&profile_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!("Launching Chrome with profile at: {}", profile_dir.display());

        let mut cmd = Command::new(&chrome_path);
        cmd.arg(format!("--remote-debugging-port={}", self.config.debug_port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!(
                "--window-size={},{}",
                self.config.window_width, self.config.window_height
            ))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if self.config.headless {
            cmd.arg("--headless=new");
        }

        let child = cmd
            .spawn()
            .map_err(|e| PlatformError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID: {:?}", child.id());
        Ok(child)
    }

    /// Kill Chrome if this launcher started it.
    pub async fn shutdown(&self) {
        if let Some(mut child) = self.process.lock().await.take() {
            info!("Shutting down Chrome...");
            if let Err(e) = child.kill().await {
                warn!("Failed to kill Chrome: {}", e);
            }
        }
    }
}
