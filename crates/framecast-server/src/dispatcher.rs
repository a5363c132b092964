//! Connection dispatcher.
//!
//! Inbound commands are read on the connection task and handed to a single
//! worker through a bounded queue, so session operations run one at a time
//! and in arrival order. Preemption happens before queueing: a new
//! `start-session`, a `stop-session` or a closing channel invalidates the
//! session generation right away, which makes a start that is still
//! launching or navigating give up instead of blocking the queue.

use std::sync::Arc;

use framecast_protocols::{ClientCommand, InputEvent, SessionEvent, StartSessionRequest};
use framecast_session::{EventSink, Session, StartTicket};
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Work item for the connection worker.
#[derive(Debug)]
enum Queued {
    Start(StartTicket),
    Stop,
    Input(InputEvent),
    Resize(Option<f64>, Option<f64>),
    Navigate(String),
}

impl Queued {
    fn name(&self) -> &'static str {
        match self {
            Queued::Start(_) => "start-session",
            Queued::Stop => "stop-session",
            Queued::Input(_) => "input-event",
            Queued::Resize(..) => "resize",
            Queued::Navigate(_) => "navigate",
        }
    }
}

/// Routes one client's commands to its session.
pub struct Dispatcher {
    session: Arc<Session>,
    sink: EventSink,
    queue: mpsc::Sender<Queued>,
    cancel: CancellationToken,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    destroyed: OnceCell<()>,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its worker.
    pub fn spawn(session: Arc<Session>, sink: EventSink, queue_capacity: usize) -> Arc<Self> {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(session.clone(), sink.clone(), rx, cancel.clone()));

        Arc::new(Self {
            session,
            sink,
            queue,
            cancel,
            worker: parking_lot::Mutex::new(Some(worker)),
            destroyed: OnceCell::new(),
        })
    }

    /// Connection id, shared with the session.
    pub fn id(&self) -> &str {
        self.session.id()
    }

    /// Get the session this dispatcher drives.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the dispatcher has been shut down.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Parse and handle one text message from the client. Malformed
    /// messages are logged and dropped.
    pub async fn handle_text(&self, text: &str) {
        match ClientCommand::from_json(text) {
            Ok(command) => self.handle(command).await,
            Err(e) => warn!("[{}] Ignoring malformed command: {}", self.id(), e),
        }
    }

    /// Handle one client command.
    pub async fn handle(&self, command: ClientCommand) {
        if self.is_closed() {
            return;
        }
        debug!("[{}] <- {}", self.id(), command.name());

        match command {
            ClientCommand::StartSession(request) => self.start(&request).await,
            ClientCommand::StopSession => {
                self.session.invalidate();
                self.enqueue(Queued::Stop).await;
            }
            ClientCommand::InputEvent(event) => self.offer_input(event),
            ClientCommand::Resize(request) => {
                self.enqueue(Queued::Resize(request.width, request.height)).await;
            }
            ClientCommand::Navigate(request) => {
                self.enqueue(Queued::Navigate(request.url().to_string())).await;
            }
        }
    }

    async fn start(&self, request: &StartSessionRequest) {
        match self.session.prepare_start(request) {
            Ok(ticket) => self.enqueue(Queued::Start(ticket)).await,
            Err(e) => {
                warn!("[{}] Rejected start-session: {}", self.id(), e);
                self.sink
                    .emit_unless(SessionEvent::error(e.to_string()), self.cancel.cancelled())
                    .await;
            }
        }
    }

    fn offer_input(&self, event: InputEvent) {
        match self.queue.try_send(Queued::Input(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("[{}] Command queue full, dropping input event", self.id());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn enqueue(&self, item: Queued) {
        let name = item.name();
        if self.queue.send(item).await.is_err() {
            debug!("[{}] Worker gone, dropping {}", self.id(), name);
        }
    }

    /// Stop the worker and destroy the session. Runs once; concurrent and
    /// later callers wait for the first to finish.
    pub async fn shutdown(&self) {
        self.destroyed
            .get_or_init(|| async {
                self.session.mark_closed();
                self.cancel.cancel();

                let worker = self.worker.lock().take();
                if let Some(worker) = worker {
                    if let Err(e) = worker.await {
                        warn!("[{}] Command worker ended abnormally: {}", self.id(), e);
                    }
                }

                self.session.destroy().await;
                info!("[{}] Connection closed, session destroyed", self.id());
            })
            .await;
    }
}

async fn run_worker(
    session: Arc<Session>,
    sink: EventSink,
    mut rx: mpsc::Receiver<Queued>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        match item {
            Queued::Start(ticket) => {
                if let Err(e) = session.run_start(ticket).await {
                    sink.emit_unless(SessionEvent::error(e.to_string()), cancel.cancelled())
                        .await;
                }
            }
            Queued::Stop => session.stop().await,
            Queued::Input(event) => session.dispatch_input(&event).await,
            Queued::Resize(width, height) => session.resize(width, height).await,
            Queued::Navigate(url) => session.navigate(&url).await,
        }
    }
    debug!("[{}] Command worker stopped", session.id());
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
