//! Shared headless-browser pool.
//!
//! One browser process serves all callers. Each caller gets an isolated
//! session (its own tab, configured with a persona fingerprint); after a
//! configurable number of sessions the process is rotated out and
//! relaunched. Concurrent launch requests coalesce into a single in-flight
//! launch that every waiter shares.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::persona::{Persona, DEFAULT_USER_AGENT};
use crate::{browser_setup, Result, SearchError};

/// Marker embedded in every disposable profile directory name. The process
/// reaper uses it to tell our browser processes apart from the user's.
pub const PROFILE_MARKER: &str = "scour-profile";

/// Sessions issued from one browser process before it is rotated out.
pub const MAX_SESSIONS_PER_BROWSER: u32 = 50;

/// Configuration for the browser pool.
#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Sessions issued before the browser process is relaunched.
    pub rotation_threshold: u32,
    /// Whether to run the browser in headless mode.
    pub headless: bool,
    /// Path to the Chrome/Chromium executable. If `None`, auto-detected.
    pub chrome_path: Option<String>,
    /// Proxy URL for the browser to use.
    pub proxy_url: Option<String>,
    /// Additional launch arguments for Chrome.
    pub launch_args: Vec<String>,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            rotation_threshold: MAX_SESSIONS_PER_BROWSER,
            headless: true,
            chrome_path: None,
            proxy_url: None,
            launch_args: Vec::new(),
        }
    }
}

type LaunchResult<H> = std::result::Result<H, String>;
type SharedLaunch<H> = Shared<BoxFuture<'static, LaunchResult<H>>>;

struct CoreInner<H> {
    handle: Option<H>,
    sessions_issued: u32,
    launch: Option<SharedLaunch<H>>,
}

/// Rotation and single-flight state machine, independent of the concrete
/// browser handle so the coordination logic is testable on its own.
///
/// States: idle (no handle, no launch), launching (shared future pending),
/// ready (healthy handle under the threshold), rotating (handle evicted,
/// next acquire launches).
pub(crate) struct PoolCore<H> {
    rotation_threshold: u32,
    inner: Mutex<CoreInner<H>>,
}

impl<H: Clone + Send + Sync + 'static> PoolCore<H> {
    pub(crate) fn new(rotation_threshold: u32) -> Self {
        Self {
            rotation_threshold: rotation_threshold.max(1),
            inner: Mutex::new(CoreInner {
                handle: None,
                sessions_issued: 0,
                launch: None,
            }),
        }
    }

    /// Returns a usable handle, launching or rotating as needed.
    ///
    /// The second element is a stale handle evicted by rotation, which the
    /// caller should dispose of. At most one launch future exists at a
    /// time; every concurrent caller awaits the same one and receives the
    /// same handle. The pending launch is cleared once it settles, success
    /// resets the session counter to zero.
    pub(crate) async fn acquire<F>(
        &self,
        healthy: impl Fn(&H) -> bool,
        launch: F,
    ) -> (LaunchResult<H>, Option<H>)
    where
        F: FnOnce() -> BoxFuture<'static, LaunchResult<H>>,
    {
        let (shared, evicted, leader) = {
            let mut inner = self.inner.lock().await;

            if let Some(handle) = inner.handle.as_ref() {
                if healthy(handle) && inner.sessions_issued < self.rotation_threshold {
                    return (Ok(handle.clone()), None);
                }
            }
            let evicted = inner.handle.take();

            match inner.launch.clone() {
                Some(pending) => (pending, evicted, false),
                None => {
                    let pending = launch().shared();
                    inner.launch = Some(pending.clone());
                    (pending, evicted, true)
                }
            }
        };

        let result = shared.await;

        if leader {
            let mut inner = self.inner.lock().await;
            inner.launch = None;
            if let Ok(handle) = &result {
                inner.handle = Some(handle.clone());
                inner.sessions_issued = 0;
            }
        }

        (result, evicted)
    }

    /// Records one issued session against the current browser.
    pub(crate) async fn note_session(&self) {
        let mut inner = self.inner.lock().await;
        inner.sessions_issued += 1;
    }

    /// Sessions issued since the last successful launch.
    pub(crate) async fn sessions_issued(&self) -> u32 {
        self.inner.lock().await.sessions_issued
    }

    /// Removes and returns the current handle, if any.
    pub(crate) async fn take_handle(&self) -> Option<H> {
        self.inner.lock().await.handle.take()
    }
}

/// A launched browser process with its CDP event pump.
///
/// Liveness is tracked through the handler task: when the CDP event stream
/// ends, the process is gone and the handle reports disconnected.
pub struct BrowserHandle {
    browser: Mutex<Browser>,
    closed: Arc<AtomicBool>,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserHandle {
    async fn launch(config: &BrowserPoolConfig) -> Result<Arc<BrowserHandle>> {
        let chrome = match &config.chrome_path {
            Some(path) => PathBuf::from(path),
            None => browser_setup::require_chrome()?,
        };
        let profile_dir = fresh_profile_dir()?;

        debug!(
            chrome = %chrome.display(),
            profile = %profile_dir.display(),
            "Launching headless browser"
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome)
            .user_data_dir(&profile_dir);

        if config.headless {
            builder = builder.arg("--headless=new");
        }

        // Chrome's headless mode injects "HeadlessChrome" into the UA; mask
        // it at launch, sessions override per-tab with their persona.
        builder = builder
            .arg(format!("--user-agent={DEFAULT_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg("--no-first-run")
            .arg("--hide-scrollbars")
            // Extraction only reads text: skip fonts, images and autoplay
            // media instead of paying for their downloads.
            .arg("--disable-remote-fonts")
            .arg("--blink-settings=imagesEnabled=false")
            .arg("--autoplay-policy=user-gesture-required");

        if let Some(proxy) = &config.proxy_url {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        for arg in &config.launch_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SearchError::Browser(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to launch browser: {e}")))?;

        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {e}");
                }
            }
            closed_flag.store(true, Ordering::SeqCst);
            debug!("Browser CDP handler exited");
        });

        Ok(Arc::new(BrowserHandle {
            browser: Mutex::new(browser),
            closed,
            handler_task,
            profile_dir,
        }))
    }

    /// Whether the browser process is still reachable.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Opens a fresh blank tab.
    pub async fn new_page(&self) -> Result<Page> {
        let browser = self.browser.lock().await;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to open tab: {e}")))
    }

    /// Closes the process and removes its profile directory. Best-effort:
    /// failures are logged, never propagated.
    pub async fn close(&self) {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {e}");
            }
        }
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!(
                "Could not remove profile dir {}: {e}",
                self.profile_dir.display()
            );
        }
    }
}

/// An isolated browsing session: one tab configured with one persona.
pub struct Session {
    page: Page,
    persona: &'static Persona,
}

impl Session {
    /// The underlying page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The fingerprint this session presents.
    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    /// Closes the tab. Best-effort; close failures are logged.
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            warn!("Failed to close session tab: {e}");
        }
    }
}

/// A shared pool managing a single rotating browser process.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    core: PoolCore<Arc<BrowserHandle>>,
}

impl BrowserPool {
    /// Creates a new browser pool with the given configuration.
    pub fn new(config: BrowserPoolConfig) -> Self {
        let core = PoolCore::new(config.rotation_threshold);
        Self { config, core }
    }

    /// Returns a healthy shared browser, launching or rotating as needed.
    ///
    /// A disconnected handle, or one that has issued `rotation_threshold`
    /// sessions, is closed (best-effort) and replaced. Concurrent callers
    /// during a launch all receive the same new instance.
    pub async fn browser(&self) -> Result<Arc<BrowserHandle>> {
        let config = self.config.clone();
        let (result, evicted) = self
            .core
            .acquire(
                |handle: &Arc<BrowserHandle>| handle.is_connected(),
                move || async move { BrowserHandle::launch(&config).await.map_err(|e| e.to_string()) }.boxed(),
            )
            .await;

        if let Some(stale) = evicted {
            debug!("Rotating browser process out");
            tokio::spawn(async move { stale.close().await });
        }

        result.map_err(SearchError::Browser)
    }

    /// Opens an isolated session configured with `persona`'s fingerprint.
    pub async fn session(&self, persona: &'static Persona) -> Result<Session> {
        let browser = self.browser().await?;
        self.core.note_session().await;

        let page = browser.new_page().await?;
        apply_fingerprint(&page, persona).await?;

        Ok(Session { page, persona })
    }

    /// Sessions issued from the current browser since its launch.
    pub async fn sessions_issued(&self) -> u32 {
        self.core.sessions_issued().await
    }

    /// Closes the managed browser if present. Processes that survive this
    /// are reclaimed by the reaper, not here.
    pub async fn close_all(&self) {
        if let Some(handle) = self.core.take_handle().await {
            handle.close().await;
        }
    }
}

/// Applies a persona's fingerprint to a fresh tab via CDP overrides.
async fn apply_fingerprint(page: &Page, persona: &Persona) -> Result<()> {
    page.execute(SetUserAgentOverrideParams {
        user_agent: persona.user_agent.to_string(),
        accept_language: Some(persona.locale.to_string()),
        platform: Some(persona.platform.to_string()),
        user_agent_metadata: None,
    })
    .await
    .map_err(|e| SearchError::Browser(format!("Failed to set user agent: {e}")))?;

    let (width, height) = persona.viewport;
    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(width as i64)
        .height(height as i64)
        .device_scale_factor(persona.device_scale_factor)
        .mobile(persona.has_touch())
        .build()
        .map_err(|e| SearchError::Browser(format!("Invalid device metrics: {e}")))?;
    page.execute(metrics)
        .await
        .map_err(|e| SearchError::Browser(format!("Failed to set device metrics: {e}")))?;

    // Secondary overrides are best-effort; a persona mismatch here is less
    // costly than losing the session.
    if let Err(e) = page
        .execute(SetTouchEmulationEnabledParams::new(persona.has_touch()))
        .await
    {
        debug!("Touch emulation override failed: {e}");
    }
    if let Err(e) = page
        .execute(SetTimezoneOverrideParams::new(persona.timezone))
        .await
    {
        debug!("Timezone override failed: {e}");
    }

    Ok(())
}

fn fresh_profile_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "{}-{}-{:08x}",
        PROFILE_MARKER,
        std::process::id(),
        rand::rng().random::<u32>()
    ));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
