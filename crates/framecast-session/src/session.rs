//! The session state machine.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use framecast_protocols::{
    EngineError, InputEvent, LaunchOptions, PageHandle, RenderEngine, SessionError, SessionEvent,
    StartSessionRequest, Viewport, WaitPolicy,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::spawn_capture_loop;
use crate::forward::spawn_event_forwarder;
use crate::options::SessionOptions;
use crate::sink::{Delivery, EventSink};
use crate::state::SessionState;

/// A validated start request, bound to the generation it created.
#[derive(Debug, Clone)]
pub struct StartTicket {
    pub generation: u64,
    pub url: String,
    pub viewport: Viewport,
}

/// How a start attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The session is streaming.
    Started,
    /// A newer start, a stop or a destroy took over; nothing was emitted.
    Superseded,
}

/// Result of racing an engine call against supersession and a deadline.
enum Guarded<T> {
    Done(Result<T, EngineError>),
    Superseded,
    TimedOut(Duration),
}

pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) page: Option<Box<dyn PageHandle>>,
    pub(crate) viewport: Viewport,
    pub(crate) capturing: bool,
    capture_task: Option<JoinHandle<()>>,
    forward_task: Option<JoinHandle<()>>,
}

/// One remote browser session, owned by one client connection.
pub struct Session {
    id: String,
    engine: Arc<dyn RenderEngine>,
    options: SessionOptions,
    sink: EventSink,
    generation: watch::Sender<u64>,
    closed: AtomicBool,
    pub(crate) inner: Mutex<SessionInner>,
}

impl Session {
    /// Create an idle session that reports to `sink`.
    pub fn new(
        id: impl Into<String>,
        engine: Arc<dyn RenderEngine>,
        options: SessionOptions,
        sink: EventSink,
    ) -> Arc<Self> {
        let viewport = options.default_viewport;
        Arc::new(Self {
            id: id.into(),
            engine,
            options,
            sink,
            generation: watch::Sender::new(0),
            closed: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                page: None,
                viewport,
                capturing: false,
                capture_task: None,
                forward_task: None,
            }),
        })
    }

    /// Connection id this session belongs to.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current generation. Work tagged with an older one is stale.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Whether the session was marked closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get the lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Get the current viewport.
    pub async fn viewport(&self) -> Viewport {
        self.inner.lock().await.viewport
    }

    /// Whether the capture loop is active.
    pub async fn is_capturing(&self) -> bool {
        self.inner.lock().await.capturing
    }

    pub(crate) fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Invalidate all in-flight work without waiting for the lock.
    ///
    /// Running starts abandon their launch or navigation, capture ticks stop
    /// rescheduling and suppress their frame.
    pub fn invalidate(&self) -> u64 {
        self.generation.send_modify(|g| *g += 1);
        self.generation()
    }

    /// Invalidate and refuse any further work. Call [`Session::destroy`] to
    /// actually release resources.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.invalidate();
    }

    /// Validate a start request and claim a new generation for it.
    pub fn prepare_start(&self, request: &StartSessionRequest) -> Result<StartTicket, SessionError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(SessionError::InvalidInput("url must not be empty".to_string()));
        }

        let viewport = self
            .options
            .default_viewport
            .with_overrides(request.width, request.height);
        let generation = self.invalidate();

        Ok(StartTicket {
            generation,
            url: url.to_string(),
            viewport,
        })
    }

    /// Start streaming `url`, tearing down any previous page first.
    pub async fn start(self: &Arc<Self>, request: &StartSessionRequest) -> Result<StartOutcome, SessionError> {
        let ticket = self.prepare_start(request)?;
        self.run_start(ticket).await
    }

    /// Execute a prepared start.
    ///
    /// The previous handle is fully released before a new one is acquired, so
    /// at most one handle is alive at any time. Returns
    /// [`StartOutcome::Superseded`] when the ticket's generation went stale.
    pub async fn run_start(self: &Arc<Self>, ticket: StartTicket) -> Result<StartOutcome, SessionError> {
        let mut inner = self.inner.lock().await;

        if self.is_stale(ticket.generation) {
            debug!("[{}] Start of {} superseded before it began", self.id, ticket.url);
            return Ok(StartOutcome::Superseded);
        }

        self.release(&mut inner).await;
        inner.state = SessionState::Starting;
        inner.viewport = ticket.viewport;
        info!("[{}] Starting session for {} ({})", self.id, ticket.url, ticket.viewport);

        let launch_options = self.options.launch_options(ticket.viewport);
        let page = match self.launch(ticket.generation, &launch_options).await {
            Guarded::Done(Ok(page)) => page,
            Guarded::Done(Err(e)) => {
                inner.state = self.resting_state();
                warn!("[{}] Browser launch failed: {}", self.id, e);
                return Err(SessionError::start_failed(e));
            }
            Guarded::Superseded | Guarded::TimedOut(_) => {
                inner.state = self.resting_state();
                debug!("[{}] Start of {} superseded during launch", self.id, ticket.url);
                return Ok(StartOutcome::Superseded);
            }
        };

        inner.forward_task = Some(spawn_event_forwarder(
            self.id.clone(),
            page.subscribe(),
            self.sink.clone(),
            self.generation.subscribe(),
            ticket.generation,
        ));
        inner.page = Some(page);

        let navigation = match inner.page.as_deref() {
            Some(page) => {
                self.guarded(
                    ticket.generation,
                    Some(self.options.start_timeout),
                    page.navigate(&ticket.url, WaitPolicy::NetworkAlmostIdle),
                )
                .await
            }
            None => Guarded::Done(Err(EngineError::Closed)),
        };

        let failure = match navigation {
            Guarded::Done(Ok(())) => None,
            Guarded::Done(Err(e)) => Some(SessionError::start_failed(e)),
            Guarded::TimedOut(after) => Some(SessionError::start_failed(format!(
                "navigation to {} timed out after {}s",
                ticket.url,
                after.as_secs()
            ))),
            Guarded::Superseded => {
                debug!("[{}] Start of {} superseded during navigation", self.id, ticket.url);
                self.release(&mut inner).await;
                inner.state = self.resting_state();
                return Ok(StartOutcome::Superseded);
            }
        };

        if let Some(err) = failure {
            warn!("[{}] {}", self.id, err);
            self.release(&mut inner).await;
            inner.state = self.resting_state();
            return Err(err);
        }

        if self.is_stale(ticket.generation) {
            self.release(&mut inner).await;
            inner.state = self.resting_state();
            return Ok(StartOutcome::Superseded);
        }

        // Emitted under the lock: no frame of this generation can precede it.
        let delivery = self
            .sink
            .emit_unless(SessionEvent::SessionStarted, self.superseded(ticket.generation))
            .await;
        match delivery {
            Delivery::Sent => {}
            Delivery::Cancelled => {
                debug!("[{}] Start of {} superseded before session-started", self.id, ticket.url);
                self.release(&mut inner).await;
                inner.state = self.resting_state();
                return Ok(StartOutcome::Superseded);
            }
            Delivery::Closed => debug!("[{}] Client went away before session-started", self.id),
        }

        inner.state = SessionState::Streaming;
        inner.capturing = true;
        inner.capture_task = Some(spawn_capture_loop(
            Arc::downgrade(self),
            ticket.generation,
            self.options.min_frame_interval,
        ));

        info!("[{}] Streaming {}", self.id, ticket.url);
        Ok(StartOutcome::Started)
    }

    /// Stop streaming and release the page. No-op when nothing is running.
    pub async fn stop(&self) {
        self.invalidate();
        let mut inner = self.inner.lock().await;

        if inner.page.is_none() && matches!(inner.state, SessionState::Idle | SessionState::Closed) {
            return;
        }

        inner.state = SessionState::Stopping;
        self.release(&mut inner).await;
        inner.state = self.resting_state();
        info!("[{}] Session stopped", self.id);
    }

    /// Stop and close the session for good. Safe to call more than once.
    pub async fn destroy(&self) {
        self.mark_closed();
        let mut inner = self.inner.lock().await;

        if inner.state == SessionState::Closed && inner.page.is_none() {
            return;
        }

        if inner.page.is_some() {
            inner.state = SessionState::Stopping;
        }
        self.release(&mut inner).await;
        inner.state = SessionState::Closed;
        info!("[{}] Session destroyed", self.id);
    }

    /// Forward one input event to the page. Unknown events and engine
    /// failures are logged and dropped.
    pub async fn dispatch_input(&self, event: &InputEvent) {
        let inner = self.inner.lock().await;
        if inner.state != SessionState::Streaming {
            return;
        }
        let Some(page) = inner.page.as_deref() else {
            return;
        };

        let Some(action) = event.action() else {
            debug!("[{}] Ignoring input event of type '{}'", self.id, event.kind);
            return;
        };

        if let Err(e) = page.dispatch(&action).await {
            warn!("[{}] {}", self.id, SessionError::TransientInputFailure(e));
        }
    }

    /// Resize the page. A missing dimension keeps its current value; a
    /// non-positive or absurd one leaves the viewport untouched.
    pub async fn resize(&self, width: Option<f64>, height: Option<f64>) {
        let mut inner = self.inner.lock().await;
        let Some(page) = inner.page.as_deref() else {
            return;
        };

        let viewport = inner.viewport.resized(width, height);
        if viewport == inner.viewport {
            return;
        }

        let result = page.set_viewport(viewport).await;
        match result {
            Ok(()) => {
                debug!("[{}] Viewport {} -> {}", self.id, inner.viewport, viewport);
                inner.viewport = viewport;
            }
            Err(e) => warn!("[{}] Resize to {} failed: {}", self.id, viewport, e),
        }
    }

    /// Navigate the running page, waiting only for DOMContentLoaded.
    pub async fn navigate(&self, url: &str) {
        let generation = self.generation();
        let inner = self.inner.lock().await;
        let Some(page) = inner.page.as_deref() else {
            return;
        };

        let url = url.trim();
        if url.is_empty() {
            debug!("[{}] Ignoring navigate without url", self.id);
            return;
        }

        let result = self
            .guarded(
                generation,
                Some(self.options.navigate_timeout),
                page.navigate(url, WaitPolicy::DomContentLoaded),
            )
            .await;
        match result {
            Guarded::Done(Ok(())) => debug!("[{}] Navigated to {}", self.id, url),
            Guarded::Done(Err(e)) => warn!("[{}] Navigation to {} failed: {}", self.id, url, e),
            Guarded::TimedOut(after) => {
                warn!("[{}] Navigation to {} timed out after {:?}", self.id, url, after)
            }
            Guarded::Superseded => debug!("[{}] Navigation to {} superseded", self.id, url),
        }
    }

    pub(crate) fn is_stale(&self, generation: u64) -> bool {
        self.is_closed() || self.generation() != generation
    }

    fn resting_state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Idle
        }
    }

    /// Resolves once `generation` is no longer current.
    pub(crate) fn superseded(&self, generation: u64) -> impl Future<Output = ()> + Send + 'static {
        wait_superseded(self.generation.subscribe(), generation)
    }

    /// Stop the capture loop and event forwarder and close the page.
    /// Close failures are logged only.
    ///
    /// Both tasks have finished when this returns, so nothing they were about
    /// to emit can land after a later `session-started`.
    async fn release(&self, inner: &mut SessionInner) {
        inner.capturing = false;
        for task in [inner.capture_task.take(), inner.forward_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
            let _ = task.await;
        }
        if let Some(page) = inner.page.take() {
            match page.close().await {
                Ok(()) => debug!("[{}] Page released", self.id),
                Err(e) => warn!("[{}] Failed to release page cleanly: {}", self.id, e),
            }
        }
    }

    /// Launch a browser for `generation`.
    ///
    /// A launch overtaken by a newer generation still runs to completion and
    /// its handle is closed before returning, so the process is reaped and
    /// its profile released before anything else is launched.
    async fn launch(&self, generation: u64, options: &LaunchOptions) -> Guarded<Box<dyn PageHandle>> {
        let launch = self.engine.launch(options);
        tokio::pin!(launch);

        let result = tokio::select! {
            biased;
            _ = self.superseded(generation) => None,
            result = &mut launch => Some(result),
        };
        match result {
            Some(result) => Guarded::Done(result),
            None => {
                debug!("[{}] Launch superseded, waiting for it to settle", self.id);
                if let Ok(page) = launch.await {
                    if let Err(e) = page.close().await {
                        warn!("[{}] Failed to release superseded launch: {}", self.id, e);
                    }
                }
                Guarded::Superseded
            }
        }
    }

    /// Race `fut` against supersession of `generation` and an optional timeout.
    async fn guarded<T, F>(&self, generation: u64, timeout: Option<Duration>, fut: F) -> Guarded<T>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let superseded = self.superseded(generation);
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => Guarded::Done(result),
                    Err(_) => Guarded::TimedOut(limit),
                },
                None => Guarded::Done(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = superseded => Guarded::Superseded,
            result = bounded => result,
        }
    }
}

async fn wait_superseded(mut rx: watch::Receiver<u64>, generation: u64) {
    let _ = rx.wait_for(|current| *current != generation).await;
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
