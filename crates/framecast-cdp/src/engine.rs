//! [`RenderEngine`] implementation backed by a local Chromium process.

use std::time::Duration;

use async_trait::async_trait;
use framecast_protocols::{
    CaptureOptions, EngineError, InputAction, LaunchOptions, PageEvent, PageHandle, RenderEngine,
    Viewport, WaitPolicy,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::client::CdpClient;
use crate::error::CdpError;
use crate::launcher::{BrowserProcess, LauncherConfig};
use crate::protocol::{CdpEvent, ScreenshotFormat, lifecycle};
use crate::session::PageSession;
use crate::stealth::{STEALTH_SCRIPT, sanitize_user_agent};

/// Grace period for the browser to exit after `Browser.close`.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const PAGE_EVENT_CAPACITY: usize = 64;

/// Launches one Chromium process per page handle.
pub struct ChromeEngine {
    config: LauncherConfig,
}

impl ChromeEngine {
    /// Create an engine that launches browsers with `config`.
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    /// Get the launcher configuration.
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageHandle>, EngineError> {
        let viewport = options.viewport;
        let process = BrowserProcess::launch(&self.config, viewport.width, viewport.height).await?;

        let client = match CdpClient::connect(process.ws_url()).await {
            Ok(client) => client,
            Err(e) => {
                discard_process(process).await;
                return Err(e.into());
            }
        };

        let page = match open_page(&client, options).await {
            Ok(page) => page,
            Err(e) => {
                drop(client);
                discard_process(process).await;
                return Err(e.into());
            }
        };

        Ok(Box::new(ChromePage::new(process, client, page)))
    }
}

async fn open_page(client: &CdpClient, options: &LaunchOptions) -> Result<PageSession, CdpError> {
    let page = client.create_page().await?;
    page.enable_domains().await?;

    let user_agent = match &options.user_agent {
        Some(ua) => Some(ua.clone()),
        // Default headless UA advertises itself; fix it up when masking.
        None if options.stealth => browser_user_agent(client).await.map(|ua| sanitize_user_agent(&ua)),
        None => None,
    };
    if let Some(ua) = user_agent {
        page.set_user_agent(&ua).await?;
    }

    if options.stealth {
        page.add_init_script(STEALTH_SCRIPT).await?;
    }

    page.set_viewport(options.viewport.width, options.viewport.height)
        .await?;
    Ok(page)
}

async fn browser_user_agent(client: &CdpClient) -> Option<String> {
    match client.call("Browser.getVersion", None).await {
        Ok(version) => version["userAgent"].as_str().map(str::to_string),
        Err(e) => {
            debug!("Browser.getVersion failed: {}", e);
            None
        }
    }
}

async fn discard_process(process: BrowserProcess) {
    if let Err(e) = process.shutdown(Duration::ZERO).await {
        warn!("Failed to stop browser after launch error: {}", e);
    }
}

/// One browser process plus its single page.
pub struct ChromePage {
    process: BrowserProcess,
    client: CdpClient,
    page: PageSession,
    events: broadcast::Sender<PageEvent>,
    forwarder: tokio::task::JoinHandle<()>,
}

impl ChromePage {
    fn new(process: BrowserProcess, client: CdpClient, page: PageSession) -> Self {
        let (events, _) = broadcast::channel(PAGE_EVENT_CAPACITY);
        let forwarder = tokio::spawn(forward_page_events(
            page.subscribe(),
            events.clone(),
            page.target_id().to_string(),
        ));
        Self {
            process,
            client,
            page,
            events,
            forwarder,
        }
    }

    /// OS process id of the browser, if still known.
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.client.is_closed() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.page.set_viewport(viewport.width, viewport.height).await?;
        Ok(())
    }

    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), EngineError> {
        self.ensure_open()?;
        let event = match wait {
            WaitPolicy::NetworkAlmostIdle => lifecycle::NETWORK_ALMOST_IDLE,
            WaitPolicy::DomContentLoaded => lifecycle::DOM_CONTENT_LOADED,
        };
        self.page.navigate(url, event).await?;
        Ok(())
    }

    async fn capture_frame(&self, options: &CaptureOptions) -> Result<String, EngineError> {
        self.ensure_open()?;
        let data = self
            .page
            .screenshot(ScreenshotFormat::Jpeg, Some(options.quality))
            .await?;
        Ok(data)
    }

    async fn dispatch(&self, action: &InputAction) -> Result<(), EngineError> {
        self.ensure_open()?;
        match action {
            InputAction::Click { x, y } => self.page.click(*x, *y).await?,
            InputAction::MouseMove { x, y } => self.page.mouse_move(*x, *y).await?,
            InputAction::Scroll { x, y, delta_x, delta_y } => {
                self.page.scroll(*x, *y, *delta_x, *delta_y).await?
            }
            InputAction::Zoom { scale } => self.page.set_page_scale(*scale).await?,
            InputAction::KeyDown { key } => self.page.press_key(key).await?,
            InputAction::Type { text } => self.page.type_text(text).await?,
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        let ChromePage {
            process,
            client,
            page,
            forwarder,
            ..
        } = *self;
        forwarder.abort();

        if let Err(e) = page.detach().await {
            debug!("Detach from {} failed: {}", page.target_id(), e);
        }
        if let Err(e) = client.close_browser().await {
            debug!("Browser.close failed: {}", e);
        }
        drop(client);

        process.shutdown(CLOSE_GRACE).await?;
        Ok(())
    }
}

async fn forward_page_events(
    mut raw: broadcast::Receiver<CdpEvent>,
    events: broadcast::Sender<PageEvent>,
    main_frame: String,
) {
    loop {
        match raw.recv().await {
            Ok(event) => {
                if let Some(mapped) = map_event(&event, &main_frame) {
                    let _ = events.send(mapped);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!("Page event feed lagged by {}", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Map a raw CDP event to a page event. Only main-frame load events count.
pub(crate) fn map_event(event: &CdpEvent, main_frame: &str) -> Option<PageEvent> {
    match event.method.as_str() {
        "Page.frameStartedLoading" if event.frame_id() == Some(main_frame) => Some(PageEvent::LoadStart),
        "Page.loadEventFired" => Some(PageEvent::LoadEnd),
        "Runtime.consoleAPICalled" => {
            let level = event.params["type"].as_str().unwrap_or("log").to_string();
            let text = event.params["args"]
                .as_array()
                .map(|args| args.iter().map(remote_object_text).collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            Some(PageEvent::Console { level, text })
        }
        _ => None,
    }
}

fn remote_object_text(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => arg["description"]
            .as_str()
            .or_else(|| arg["type"].as_str())
            .unwrap_or_default()
            .to_string(),
    }
}
