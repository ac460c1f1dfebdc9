//! Utilities for declaring an async (usually debounced) hook

use std::time::Duration;

use futures_executor::block_on;
use tokio::sync::mpsc::{self, error::TrySendError, Sender};
use tokio::time::Instant;

/// How many events may pile up for a hook before senders start dropping.
/// Hook tasks drain their channel eagerly, so this depth is only reached
/// when the executor is severely overloaded.
const EVENT_BACKLOG: usize = 128;

/// How long a sender is willing to wait on a saturated hook before the
/// event is dropped instead of stalling the editor loop.
const SEND_GRACE: Duration = Duration::from_millis(10);

/// An async hook is a background tokio task that waits for events (usually
/// an enum) sent through a channel and may debounce them before acting.
///
/// The completion coordinator uses this for everything that must not fire
/// on every keystroke: the popup selection handler waits out rapid cursor
/// movement before resolving documentation, and trigger events coalesce
/// while the user is typing quickly. `handle_event` runs for every event as
/// it arrives and either consumes it or schedules a deadline;
/// `finish_debounce` runs when the deadline passes without a newer event.
pub trait AsyncHook: Sync + Send + 'static + Sized {
    type Event: Sync + Send + 'static;

    /// Called immediately for every received event. May consume the event
    /// on the spot or debounce it by returning a (possibly updated)
    /// deadline.
    fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

    /// Called when the debounce deadline is reached.
    fn finish_debounce(&mut self);

    fn spawn(self) -> mpsc::Sender<Self::Event> {
        let (tx, rx) = mpsc::channel(EVENT_BACKLOG);
        tokio::spawn(run(self, rx));
        tx
    }
}

async fn run<H: AsyncHook>(mut hook: H, mut rx: mpsc::Receiver<H::Event>) {
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => deadline = hook.handle_event(event, deadline),
                None => break,
            },
            // armed only while a debounce is pending; a fresh event above
            // replaces the deadline before the timer is re-polled
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                if deadline.is_some() =>
            {
                deadline = None;
                hook.finish_debounce();
            }
        }
    }
}

/// Sends an event to a hook from sync code without risking a deadlock.
///
/// Tokio's own `blocking_send` panics when called from within a runtime;
/// the fast path here is a non-blocking send, with a short bounded wait as
/// fallback. An event on a hook that stays saturated past the grace period
/// is dropped rather than stalling the caller.
pub fn send_blocking<T>(tx: &Sender<T>, event: T) {
    let Err(TrySendError::Full(event)) = tx.try_send(event) else {
        return;
    };
    if block_on(tx.send_timeout(event, SEND_GRACE)).is_err() {
        log::warn!("async hook overloaded, dropping an event");
    }
}
