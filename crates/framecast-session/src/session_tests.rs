use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use framecast_protocols::{CaptureOptions, InputAction, LaunchOptions, PageEvent};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use super::*;

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    next_id: AtomicUsize,
    captures: AtomicUsize,
    launches: Mutex<Vec<LaunchOptions>>,
    navigations: Mutex<Vec<(String, WaitPolicy)>>,
    inputs: Mutex<Vec<InputAction>>,
    viewports: Mutex<Vec<Viewport>>,
}

impl Recorder {
    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Behavior {
    launch_delay: Duration,
    navigate_delay: Duration,
    slow_urls: HashMap<String, Duration>,
    capture_delay: Duration,
    fail_launch: bool,
    fail_navigation: bool,
    fail_capture_after: Option<usize>,
    fail_input: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            launch_delay: Duration::ZERO,
            navigate_delay: Duration::from_millis(5),
            slow_urls: HashMap::new(),
            // Non-zero so the paused test clock can advance between ticks.
            capture_delay: Duration::from_millis(10),
            fail_launch: false,
            fail_navigation: false,
            fail_capture_after: None,
            fail_input: false,
        }
    }
}

struct MockEngine {
    recorder: Arc<Recorder>,
    behavior: Behavior,
}

#[async_trait]
impl RenderEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageHandle>, EngineError> {
        self.recorder.launches.lock().push(options.clone());
        if !self.behavior.launch_delay.is_zero() {
            tokio::time::sleep(self.behavior.launch_delay).await;
        }
        if self.behavior.fail_launch {
            return Err(EngineError::LaunchFailed("mock launch failure".to_string()));
        }

        let id = self.recorder.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.recorder.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_live.fetch_max(live, Ordering::SeqCst);
        self.recorder.log.lock().push(format!("acquire:{}", id));

        let (events, _) = broadcast::channel(16);
        Ok(Box::new(MockPage {
            id,
            recorder: self.recorder.clone(),
            behavior: self.behavior.clone(),
            events,
        }))
    }
}

struct MockPage {
    id: usize,
    recorder: Arc<Recorder>,
    behavior: Behavior,
    events: broadcast::Sender<PageEvent>,
}

#[async_trait]
impl PageHandle for MockPage {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), EngineError> {
        self.recorder.viewports.lock().push(viewport);
        Ok(())
    }

    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), EngineError> {
        self.recorder.navigations.lock().push((url.to_string(), wait));
        let _ = self.events.send(PageEvent::LoadStart);

        let delay = self
            .behavior
            .slow_urls
            .get(url)
            .copied()
            .unwrap_or(self.behavior.navigate_delay);
        tokio::time::sleep(delay).await;

        if self.behavior.fail_navigation {
            return Err(EngineError::NavigationFailed(format!("net::ERR_FAILED ({})", url)));
        }
        let _ = self.events.send(PageEvent::Console {
            level: "log".to_string(),
            text: "ready".to_string(),
        });
        let _ = self.events.send(PageEvent::LoadEnd);
        Ok(())
    }

    async fn capture_frame(&self, _options: &CaptureOptions) -> Result<String, EngineError> {
        let n = self.recorder.captures.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.behavior.capture_delay).await;
        if let Some(limit) = self.behavior.fail_capture_after {
            if n > limit {
                return Err(EngineError::Protocol("mock capture failure".to_string()));
            }
        }
        Ok(STANDARD.encode(format!("jpeg:{}:{}", self.id, n)))
    }

    async fn dispatch(&self, action: &InputAction) -> Result<(), EngineError> {
        if self.behavior.fail_input {
            return Err(EngineError::Protocol("mock input failure".to_string()));
        }
        self.recorder.inputs.lock().push(action.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.recorder.live.fetch_sub(1, Ordering::SeqCst);
        self.recorder.log.lock().push(format!("release:{}", self.id));
        Ok(())
    }
}

fn harness_with(
    behavior: Behavior,
    options: SessionOptions,
) -> (Arc<Session>, Arc<Recorder>, mpsc::Receiver<SessionEvent>) {
    let recorder = Arc::new(Recorder::default());
    let engine = Arc::new(MockEngine {
        recorder: recorder.clone(),
        behavior,
    });
    let (sink, rx) = EventSink::channel(16);
    let session = Session::new("conn-1", engine, options, sink);
    (session, recorder, rx)
}

fn harness(behavior: Behavior) -> (Arc<Session>, Arc<Recorder>, mpsc::Receiver<SessionEvent>) {
    harness_with(behavior, SessionOptions::default())
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn wait_for_frames(rx: &mut mpsc::Receiver<SessionEvent>, count: usize) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while seen.iter().filter(|e| matches!(e, SessionEvent::Frame(_))).count() < count {
        seen.push(next_event(rx).await);
    }
    seen
}

fn drain(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[SessionEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

#[tokio::test(start_paused = true)]
async fn test_start_streams_frames_after_session_started() {
    let (session, recorder, mut rx) = harness(Behavior::default());

    let outcome = session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(session.state().await, SessionState::Streaming);

    let seen = wait_for_frames(&mut rx, 3).await;
    let started = seen.iter().position(|e| *e == SessionEvent::SessionStarted).unwrap();
    let first_frame = seen
        .iter()
        .position(|e| matches!(e, SessionEvent::Frame(_)))
        .unwrap();
    assert!(started < first_frame);

    let SessionEvent::Frame(ref data) = seen[first_frame] else {
        unreachable!()
    };
    let decoded = STANDARD.decode(data).unwrap();
    assert!(decoded.starts_with(b"jpeg:1:"));

    assert_eq!(
        recorder.navigations.lock()[0],
        ("https://example.com".to_string(), WaitPolicy::NetworkAlmostIdle)
    );
    assert!(session.is_capturing().await);
}

#[tokio::test(start_paused = true)]
async fn test_start_rejects_empty_url() {
    let (session, recorder, mut rx) = harness(Behavior::default());

    let result = session.start(&StartSessionRequest::new("   ")).await;
    assert!(matches!(result, Err(SessionError::InvalidInput(_))));
    assert!(recorder.launches.lock().is_empty());
    assert_eq!(session.generation(), 0);
    assert_eq!(session.state().await, SessionState::Idle);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_start_uses_default_viewport_for_bad_dimensions() {
    let (session, recorder, _rx) = harness(Behavior::default());

    let request = StartSessionRequest {
        url: "https://example.com".to_string(),
        width: Some(0.0),
        height: Some(900.0),
    };
    session.start(&request).await.unwrap();

    let expected = Viewport { width: 1280, height: 900 };
    assert_eq!(session.viewport().await, expected);
    assert_eq!(recorder.launches.lock()[0].viewport, expected);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_reports_start_failed() {
    let (session, recorder, mut rx) = harness(Behavior {
        fail_launch: true,
        ..Default::default()
    });

    match session.start(&StartSessionRequest::new("https://example.com")).await {
        Err(SessionError::SessionStartFailed(msg)) => assert!(msg.contains("mock launch failure")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(recorder.live(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_releases_handle() {
    let (session, recorder, mut rx) = harness(Behavior {
        fail_navigation: true,
        ..Default::default()
    });

    match session.start(&StartSessionRequest::new("https://down.test")).await {
        Err(SessionError::SessionStartFailed(msg)) => assert!(msg.contains("ERR_FAILED")),
        other => panic!("unexpected result: {:?}", other),
    }

    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(recorder.live(), 0);
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, "session-started"), 0);
    assert_eq!(count(&events, "frame"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_timeout_releases_handle() {
    let (session, recorder, _rx) = harness(Behavior {
        navigate_delay: Duration::from_secs(120),
        ..Default::default()
    });

    match session.start(&StartSessionRequest::new("https://hang.test")).await {
        Err(SessionError::SessionStartFailed(msg)) => {
            assert!(msg.contains("timed out"));
            assert!(msg.contains("60s"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(recorder.live(), 0);
    assert_eq!(session.state().await, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_suppresses_further_frames() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    wait_for_frames(&mut rx, 2).await;

    session.stop().await;
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(recorder.live(), 0);
    assert!(!session.is_capturing().await);

    // Anything still queued was emitted before stop returned.
    drain(&mut rx);
    let captures = recorder.captures();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(recorder.captures(), captures);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let (session, recorder, _rx) = harness(Behavior::default());

    session.stop().await;
    assert_eq!(session.state().await, SessionState::Idle);
    assert!(recorder.launches.lock().is_empty());

    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    session.stop().await;
    session.stop().await;

    assert_eq!(recorder.log(), vec!["acquire:1", "release:1"]);
    assert_eq!(session.state().await, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_restart_releases_previous_handle_first() {
    let (session, recorder, mut rx) = harness(Behavior::default());

    session
        .start(&StartSessionRequest::new("https://a.test"))
        .await
        .unwrap();
    session
        .start(&StartSessionRequest::new("https://b.test"))
        .await
        .unwrap();

    assert_eq!(recorder.log(), vec!["acquire:1", "release:1", "acquire:2"]);
    assert_eq!(recorder.max_live(), 1);

    let seen = wait_for_frames(&mut rx, 2).await;
    assert_eq!(count(&seen, "session-started"), 2);
    let last = seen.last().unwrap();
    let SessionEvent::Frame(data) = last else {
        unreachable!()
    };
    assert!(STANDARD.decode(data).unwrap().starts_with(b"jpeg:2:"));
}

#[tokio::test(start_paused = true)]
async fn test_second_start_supersedes_pending_navigation() {
    let mut behavior = Behavior::default();
    behavior
        .slow_urls
        .insert("https://slow.test".to_string(), Duration::from_secs(30));
    let (session, recorder, mut rx) = harness(behavior);

    let first = session
        .prepare_start(&StartSessionRequest::new("https://slow.test"))
        .unwrap();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.run_start(first).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(recorder.live(), 1);

    let second = session
        .prepare_start(&StartSessionRequest::new("https://fast.test"))
        .unwrap();
    let outcome = session.run_start(second).await.unwrap();
    let superseded = pending.await.unwrap().unwrap();

    assert_eq!(superseded, StartOutcome::Superseded);
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1", "acquire:2"]);
    assert_eq!(recorder.max_live(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, "session-started"), 1);
    assert!(count(&events, "frame") > 0);
    assert_eq!(
        recorder.navigations.lock().last().map(|(url, _)| url.clone()),
        Some("https://fast.test".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_start_supersedes_pending_launch() {
    let (session, recorder, mut rx) = harness(Behavior {
        launch_delay: Duration::from_secs(5),
        ..Default::default()
    });

    let first = session
        .prepare_start(&StartSessionRequest::new("https://a.test"))
        .unwrap();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.run_start(first).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    let outcome = session
        .start(&StartSessionRequest::new("https://b.test"))
        .await
        .unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Superseded);
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(recorder.launches.lock().len(), 2);
    // The overtaken launch settles and is closed before the next one begins.
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1", "acquire:2"]);
    assert_eq!(recorder.max_live(), 1);

    let seen = wait_for_frames(&mut rx, 1).await;
    assert_eq!(count(&seen, "session-started"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_abandons_pending_start() {
    let mut behavior = Behavior::default();
    behavior
        .slow_urls
        .insert("https://slow.test".to_string(), Duration::from_secs(30));
    let (session, recorder, mut rx) = harness(behavior);

    let ticket = session
        .prepare_start(&StartSessionRequest::new("https://slow.test"))
        .unwrap();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.run_start(ticket).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    session.stop().await;

    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Superseded);
    assert_eq!(recorder.live(), 0);
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(count(&drain(&mut rx), "session-started"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_is_terminal() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    wait_for_frames(&mut rx, 1).await;

    session.destroy().await;
    assert_eq!(session.state().await, SessionState::Closed);
    assert_eq!(recorder.live(), 0);
    assert!(session.is_closed());

    session.destroy().await;
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1"]);

    let outcome = session
        .start(&StartSessionRequest::new("https://again.test"))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Superseded);
    assert_eq!(recorder.launches.lock().len(), 1);

    session.stop().await;
    session.resize(Some(640.0), Some(480.0)).await;
    session.navigate("https://elsewhere.test").await;
    assert_eq!(session.state().await, SessionState::Closed);
    assert!(recorder.viewports.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_from_other_task_releases_promptly() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    wait_for_frames(&mut rx, 1).await;

    let closer = {
        let session = session.clone();
        tokio::spawn(async move { session.destroy().await })
    };
    closer.await.unwrap();

    assert_eq!(recorder.live(), 0);
    drain(&mut rx);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_input() {
    let (session, recorder, _rx) = harness(Behavior::default());
    let click = InputEvent {
        kind: "click".to_string(),
        x: Some(10.0),
        y: Some(20.0),
        ..Default::default()
    };

    // Not streaming yet.
    session.dispatch_input(&click).await;
    assert!(recorder.inputs.lock().is_empty());

    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();

    let unknown = InputEvent {
        kind: "teleport".to_string(),
        ..Default::default()
    };
    session.dispatch_input(&unknown).await;
    session.dispatch_input(&click).await;

    assert_eq!(
        *recorder.inputs.lock(),
        vec![InputAction::Click { x: 10.0, y: 20.0 }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_input_failure_does_not_end_session() {
    let (session, _recorder, mut rx) = harness(Behavior {
        fail_input: true,
        ..Default::default()
    });
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();

    let key = InputEvent {
        kind: "keydown".to_string(),
        key: Some("Enter".to_string()),
        ..Default::default()
    };
    session.dispatch_input(&key).await;

    assert_eq!(session.state().await, SessionState::Streaming);
    drain(&mut rx);
    wait_for_frames(&mut rx, 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_resize() {
    let (session, recorder, _rx) = harness(Behavior::default());

    // No page yet.
    session.resize(Some(640.0), Some(480.0)).await;
    assert!(recorder.viewports.lock().is_empty());

    let request = StartSessionRequest {
        url: "https://example.com".to_string(),
        width: Some(800.0),
        height: Some(600.0),
    };
    session.start(&request).await.unwrap();
    let initial = Viewport { width: 800, height: 600 };
    assert_eq!(session.viewport().await, initial);

    session.resize(Some(0.0), Some(0.0)).await;
    assert_eq!(session.viewport().await, initial);
    session.resize(Some(-1.0), Some(5.0)).await;
    assert_eq!(session.viewport().await, initial);
    assert!(recorder.viewports.lock().is_empty());

    session.resize(Some(1024.0), None).await;
    let resized = Viewport { width: 1024, height: 600 };
    assert_eq!(session.viewport().await, resized);
    assert_eq!(*recorder.viewports.lock(), vec![resized]);
}

#[tokio::test(start_paused = true)]
async fn test_navigate_uses_dom_content_loaded() {
    let (session, recorder, mut rx) = harness(Behavior::default());

    session.navigate("https://nowhere.test").await;
    assert!(recorder.navigations.lock().is_empty());

    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    session.navigate("https://next.test").await;

    assert_eq!(
        recorder.navigations.lock()[1],
        ("https://next.test".to_string(), WaitPolicy::DomContentLoaded)
    );

    let seen = wait_for_frames(&mut rx, 2).await;
    assert!(count(&seen, "loading-start") >= 1);
    assert!(count(&seen, "loading-end") >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_throughput_is_bounded_by_capture_time() {
    let (session, recorder, mut rx) = harness(Behavior {
        capture_delay: Duration::from_millis(50),
        ..Default::default()
    });
    let frames = Arc::new(AtomicUsize::new(0));
    let consumer = {
        let frames = frames.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if matches!(event, SessionEvent::Frame(_)) {
                    frames.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
    };

    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    session.destroy().await;

    // 50ms per capture allows at most ~20 ticks per second.
    let captures = recorder.captures();
    assert!(captures <= 21, "captures = {}", captures);
    assert!(captures >= 15, "captures = {}", captures);
    assert!(frames.load(Ordering::SeqCst) <= captures);

    drop(session);
    consumer.abort();
}

#[tokio::test(start_paused = true)]
async fn test_min_frame_interval_floor() {
    let options = SessionOptions {
        min_frame_interval: Some(Duration::from_millis(100)),
        ..Default::default()
    };
    let (session, recorder, mut rx) = harness_with(Behavior::default(), options);
    let consumer = tokio::spawn(async move { while rx.recv().await.is_some() {} });

    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    session.stop().await;

    let captures = recorder.captures();
    assert!(captures <= 11, "captures = {}", captures);
    assert!(captures >= 8, "captures = {}", captures);
    consumer.abort();
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_halts_loop() {
    let (session, recorder, mut rx) = harness(Behavior {
        fail_capture_after: Some(2),
        ..Default::default()
    });
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(recorder.captures(), 3);
    assert!(!session.is_capturing().await);
    assert_eq!(session.state().await, SessionState::Streaming);
    assert_eq!(count(&drain(&mut rx), "frame"), 2);
    assert_eq!(recorder.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_client_stops_capture() {
    let (session, recorder, rx) = harness(Behavior::default());
    drop(rx);

    let outcome = session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(recorder.captures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_launch_releases_launched_handle() {
    let (session, recorder, mut rx) = harness(Behavior {
        launch_delay: Duration::from_secs(2),
        ..Default::default()
    });

    let ticket = session
        .prepare_start(&StartSessionRequest::new("https://a.test"))
        .unwrap();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.run_start(ticket).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;

    session.stop().await;

    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Superseded);
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1"]);
    assert_eq!(recorder.live(), 0);
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(count(&drain(&mut rx), "session-started"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_outbound_queue_pauses_capture() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();

    // Nobody reads: the queue fills and the loop parks on the next frame.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stalled_at = recorder.captures();
    assert!(stalled_at <= 17, "captured {} frames into a 16-slot queue", stalled_at);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(recorder.captures(), stalled_at);

    // Reading again resumes streaming.
    drain(&mut rx);
    wait_for_frames(&mut rx, 3).await;
    assert!(recorder.captures() > stalled_at);
}

#[tokio::test(start_paused = true)]
async fn test_stop_with_stalled_client_releases_handle() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    tokio::time::timeout(Duration::from_secs(5), session.stop())
        .await
        .expect("stop blocked behind a full outbound queue");

    assert_eq!(recorder.live(), 0);
    assert_eq!(session.state().await, SessionState::Idle);

    // The pending frame was dropped, and nothing follows the backlog.
    let captured = recorder.captures();
    let backlog = drain(&mut rx);
    assert!(count(&backlog, "frame") <= 15);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(recorder.captures(), captured);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_with_stalled_client_releases_handle() {
    let (session, recorder, _rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://example.com"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    tokio::time::timeout(Duration::from_secs(5), session.destroy())
        .await
        .expect("destroy blocked behind a full outbound queue");

    assert_eq!(recorder.live(), 0);
    assert_eq!(session.state().await, SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_restart_with_stalled_client_orders_session_started() {
    let (session, recorder, mut rx) = harness(Behavior::default());
    session
        .start(&StartSessionRequest::new("https://a.test"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The new session-started waits for room, so restart in the background.
    let restart = {
        let session = session.clone();
        tokio::spawn(async move { session.start(&StartSessionRequest::new("https://b.test")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.log(), vec!["acquire:1", "release:1", "acquire:2"]);

    let is_second_frame = |e: &SessionEvent| match e {
        SessionEvent::Frame(data) => STANDARD.decode(data).unwrap().starts_with(b"jpeg:2:"),
        _ => false,
    };
    let mut seen = Vec::new();
    while !seen.iter().any(is_second_frame) {
        seen.push(next_event(&mut rx).await);
    }
    assert_eq!(restart.await.unwrap().unwrap(), StartOutcome::Started);

    // Every frame of the first page precedes the second session-started.
    assert_eq!(count(&seen, "session-started"), 2);
    let second_started = seen
        .iter()
        .rposition(|e| *e == SessionEvent::SessionStarted)
        .unwrap();
    let first_of_second = seen.iter().position(is_second_frame).unwrap();
    assert!(second_started < first_of_second);
    assert_eq!(count(&seen[second_started..], "frame"), 1);
}
