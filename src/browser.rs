//! Headless Chrome session shared by the diagram renderer and the HTML engine.
//!
//! A [`BrowserSession`] belongs to one [`crate::convert::ConversionContext`].
//! Chrome is started on first use only, so documents without diagrams never
//! pay for a browser. If the launch fails the error is remembered and every
//! later request fails immediately with the same detail instead of retrying
//! a multi-second launch per diagram.
//!
//! Tabs are handed out as [`TabGuard`]s which close the tab when dropped, on
//! success and error paths alike. The browser process is terminated when the
//! session is dropped or reconfigured with different launch settings.

use crate::config::ConversionConfig;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsString;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long an idle browser is kept alive between requests.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Launch parameters derived from the conversion config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub chrome_path: Option<PathBuf>,
    /// Viewport in CSS pixels.
    pub window: (u32, u32),
    /// Device scale factor applied to every screenshot.
    pub scale: u32,
    /// Default wait for navigation and element lookups.
    pub timeout: Duration,
}

impl LaunchSettings {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            window: config.diagram_canvas,
            scale: config.diagram_scale,
            timeout: Duration::from_secs(config.diagram_timeout_secs),
        }
    }

    /// Whether switching to `other` needs a new browser process. The timeout
    /// is applied per tab and never does.
    fn needs_relaunch(&self, other: &LaunchSettings) -> bool {
        self.chrome_path != other.chrome_path || self.window != other.window || self.scale != other.scale
    }

    fn extra_args(&self) -> Vec<OsString> {
        vec![
            OsString::from(format!("--force-device-scale-factor={}", self.scale)),
            OsString::from("--hide-scrollbars"),
            OsString::from("--disable-gpu"),
            OsString::from("--font-render-hinting=none"),
        ]
    }
}

enum SessionState {
    NotStarted,
    Running(Browser),
    Failed(String),
}

/// A lazily launched headless browser.
pub struct BrowserSession {
    settings: LaunchSettings,
    state: SessionState,
}

impl BrowserSession {
    pub fn new(config: &ConversionConfig) -> Self {
        Self::with_settings(LaunchSettings::from_config(config))
    }

    pub fn with_settings(settings: LaunchSettings) -> Self {
        Self {
            settings,
            state: SessionState::NotStarted,
        }
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Adopt the settings of a new conversion.
    ///
    /// When the executable, viewport or scale changed, a running browser is
    /// closed and a remembered launch failure is forgotten, so the next
    /// request launches with the new settings. Returns whether that happened.
    pub fn reconfigure(&mut self, settings: LaunchSettings) -> bool {
        let relaunch = self.settings.needs_relaunch(&settings);
        if relaunch {
            if self.is_running() {
                debug!("Launch settings changed, closing headless browser");
            }
            self.state = SessionState::NotStarted;
        }
        self.settings = settings;
        relaunch
    }

    /// Whether a browser process is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    /// The launch failure, if the browser could not be started.
    pub fn launch_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed(detail) => Some(detail),
            _ => None,
        }
    }

    /// Start the browser if needed and return it.
    pub fn browser(&mut self) -> Result<&Browser, String> {
        if let SessionState::NotStarted = self.state {
            self.state = match launch(&self.settings) {
                Ok(browser) => SessionState::Running(browser),
                Err(detail) => {
                    warn!("Headless browser unavailable: {}", detail);
                    SessionState::Failed(detail)
                }
            };
        }
        match &self.state {
            SessionState::Running(browser) => Ok(browser),
            SessionState::Failed(detail) => Err(detail.clone()),
            SessionState::NotStarted => Err("browser was not started".to_string()),
        }
    }

    /// Open a new tab that is closed again when the guard drops.
    pub fn open_tab(&mut self) -> Result<TabGuard, String> {
        let timeout = self.settings.timeout;
        let tab = self
            .browser()?
            .new_tab()
            .map_err(|e| format!("failed to open tab: {e}"))?;
        tab.set_default_timeout(timeout);
        Ok(TabGuard { tab })
    }
}


fn launch(settings: &LaunchSettings) -> Result<Browser, String> {
    let args = settings.extra_args();
    let options = LaunchOptions::default_builder()
        .headless(true)
        // Chrome refuses to start as root with the sandbox enabled.
        .sandbox(false)
        .window_size(Some(settings.window))
        .path(settings.chrome_path.clone())
        .idle_browser_timeout(IDLE_TIMEOUT)
        .args(args.iter().map(|a| a.as_os_str()).collect())
        .build()
        .map_err(|e| format!("invalid launch options: {e}"))?;

    info!(
        "Launching headless browser ({}x{} @{}x)",
        settings.window.0, settings.window.1, settings.scale
    );
    Browser::new(options).map_err(|e| e.to_string())
}

/// A browser tab that closes itself on drop.
pub struct TabGuard {
    tab: Arc<Tab>,
}

impl Deref for TabGuard {
    type Target = Tab;

    fn deref(&self) -> &Tab {
        &self.tab
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed: {}", e);
        }
    }
}
