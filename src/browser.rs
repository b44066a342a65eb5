//! Native browser session management using `chromiumoxide`.
//!
//! This module is the single source of truth for:
//! * Finding a usable Chromium-family executable (cross-platform).
//! * Launching the one **visible** browser window the whole run shares —
//!   headful because the operator logs in by hand.
//! * Navigation with a bounded page-load timeout.
//! * Releasing the browser exactly once at shutdown.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::checker::{query_url, QueryError, QueryNavigator};
use crate::session;

/// Landing page for the initial navigation and the login check.
pub const PARTNER_HOME: &str = "https://partner.steamgames.com/?l=english";

const BAD_GATEWAY_MARKER: &str = "Bad Gateway";

/// Upper bound on a single page load before the attempt counts as a
/// navigation timeout and the retry back-off kicks in.
const NAV_TIMEOUT: Duration = Duration::from_secs(30);

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan — finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "brave",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/brave-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Build a headful `BrowserConfig` for the interactive session.
///
/// The window must stay visible so the operator can sign in; the
/// automation infobar and first-run noise are suppressed, and the
/// `navigator.webdriver` fingerprint is disabled so the login flow looks
/// like a normal browser to the site.
fn build_visible_config(exe: &str) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .with_head()
        .chrome_executable(exe)
        .window_size(1280, 900)
        .arg("--disable-infobars")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--log-level=3")
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Session ──────────────────────────────────────────────────────────────────

/// The exclusively-owned browser context for one process lifetime.
///
/// Acquired once at startup, released exactly once via [`shutdown`]
/// (which is idempotent, so the guaranteed-cleanup path in `main` is safe
/// on every exit route). All queries reuse the single page.
///
/// [`shutdown`]: BrowserSession::shutdown
pub struct BrowserSession {
    inner: Mutex<Option<Browser>>,
    page: Page,
}

impl BrowserSession {
    /// Discover an executable, launch the visible browser, and open the
    /// working tab. Errors here are fatal/startup-class.
    pub async fn launch() -> Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!(
                "No browser found. Install Google Chrome, Chromium, or Brave. \
                 Set CHROME_EXECUTABLE if installed in a non-standard location."
            )
        })?;

        info!("launching browser: {}", exe);
        let config = build_visible_config(&exe)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Could not start the browser ({}): {}", exe, e))?;

        // Drain CDP events for the lifetime of the browser process.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open a browser tab: {}", e))?;

        Ok(Self {
            inner: Mutex::new(Some(browser)),
            page,
        })
    }

    /// The single working page all navigation and extraction goes through.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate the working page and wait for the load to finish, bounded
    /// by [`NAV_TIMEOUT`].
    pub async fn goto(&self, url: &str) -> Result<(), QueryError> {
        let nav = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| QueryError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| QueryError::Navigation(e.to_string()))?;
            Ok(())
        };
        match tokio::time::timeout(NAV_TIMEOUT, nav).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout),
        }
    }

    /// Initial navigation to the partner site. Failure here is fatal.
    pub async fn open_partner_home(&self) -> Result<()> {
        self.goto(PARTNER_HOME)
            .await
            .map_err(|e| anyhow!("Failed to reach Steam Partner ({}): {}", PARTNER_HOME, e))
    }

    /// Whether the current page shows an authenticated partner session.
    pub async fn is_logged_in(&self) -> bool {
        session::is_logged_in(&self.page).await
    }

    /// Close the browser. Safe to call more than once; only the first call
    /// does anything.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close error (non-fatal): {}", e);
            }
            info!("browser session closed");
        }
    }
}

#[async_trait]
impl QueryNavigator for BrowserSession {
    async fn open_query(&self, key: &str) -> Result<(), QueryError> {
        self.goto(&query_url(key)).await
    }

    async fn bad_gateway(&self) -> bool {
        let title = self.page.get_title().await.ok().flatten().unwrap_or_default();
        if title.contains(BAD_GATEWAY_MARKER) {
            return true;
        }
        match self.page.content().await {
            Ok(body) => body.contains(BAD_GATEWAY_MARKER),
            // An unreadable page is not worth extracting from; let the
            // retry loop take another pass at it.
            Err(_) => true,
        }
    }
}
