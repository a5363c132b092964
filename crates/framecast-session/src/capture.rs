//! Self-pacing capture loop.
//!
//! The next tick is scheduled only after the previous frame was captured and
//! handed to the sink, so a slow engine or a slow client lowers the frame rate
//! instead of queueing work. There is never more than one tick per session.
//!
//! The screenshot is taken under the session lock; the hand-off to the client
//! is not. A full outbound queue therefore parks only the tick, and a stop or
//! restart drops the pending frame instead of waiting behind it.

use std::sync::Weak;
use std::time::Duration;

use framecast_protocols::{SessionError, SessionEvent};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::session::Session;
use crate::sink::Delivery;
use crate::state::SessionState;

pub(crate) fn spawn_capture_loop(
    session: Weak<Session>,
    generation: u64,
    min_interval: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let tick_started = Instant::now();
            let Some(session) = session.upgrade() else {
                break;
            };
            let again = session.capture_tick(generation).await;
            drop(session);

            if !again {
                break;
            }
            match min_interval {
                Some(interval) => tokio::time::sleep_until(tick_started + interval).await,
                None => tokio::task::yield_now().await,
            }
        }
    })
}

impl Session {
    /// Run one capture tick for `generation`. Returns whether the loop should
    /// schedule another tick.
    pub(crate) async fn capture_tick(&self, generation: u64) -> bool {
        let frame = {
            let mut inner = self.inner.lock().await;

            if inner.state != SessionState::Streaming
                || !inner.capturing
                || self.is_stale(generation)
                || self.sink().is_closed()
            {
                return false;
            }
            let Some(page) = inner.page.as_deref() else {
                return false;
            };

            let result = page.capture_frame(&self.options().capture_options()).await;
            match result {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("[{}] {}; streaming halted", self.id(), SessionError::CaptureFailure(e));
                    inner.capturing = false;
                    return false;
                }
            }
        };

        // A stop or restart may have landed while the screenshot was in flight.
        if self.is_stale(generation) {
            debug!("[{}] Dropping frame of stale generation {}", self.id(), generation);
            return false;
        }

        trace!("[{}] Frame ({} bytes)", self.id(), frame.len());
        let delivery = self
            .sink()
            .emit_unless(SessionEvent::Frame(frame), self.superseded(generation))
            .await;
        match delivery {
            Delivery::Sent => true,
            Delivery::Cancelled => {
                debug!("[{}] Dropping frame of stale generation {}", self.id(), generation);
                false
            }
            Delivery::Closed => {
                debug!("[{}] Client gone, capture loop ending", self.id());
                let mut inner = self.inner.lock().await;
                if !self.is_stale(generation) {
                    inner.capturing = false;
                }
                false
            }
        }
    }
}
