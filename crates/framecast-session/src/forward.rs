//! Page event forwarding.

use framecast_protocols::{PageEvent, SessionEvent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::sink::{Delivery, EventSink};

/// Relay load events of one page to the client while `generation` is current.
/// Console messages are logged only.
pub(crate) fn spawn_event_forwarder(
    session_id: String,
    mut events: broadcast::Receiver<PageEvent>,
    sink: EventSink,
    mut current: watch::Receiver<u64>,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = current.wait_for(|g| *g != generation) => break,
                received = events.recv() => match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("[{}] Page events lagged by {}", session_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let outbound = match event {
                PageEvent::LoadStart => SessionEvent::LoadingStart,
                PageEvent::LoadEnd => SessionEvent::LoadingEnd,
                PageEvent::Console { level, text } => {
                    debug!("[{}] console.{}: {}", session_id, level, text);
                    continue;
                }
            };

            if *current.borrow() != generation {
                break;
            }
            let mut stale = current.clone();
            let cancelled = async move {
                let _ = stale.wait_for(|g| *g != generation).await;
            };
            if sink.emit_unless(outbound, cancelled).await != Delivery::Sent {
                break;
            }
        }
    })
}
