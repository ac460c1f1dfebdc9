use std::borrow::Borrow;
use std::future::Future;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use tokio::sync::Notify;

/// Runs `future` to completion unless `cancel` fires first, in which case
/// the future is dropped and `None` is returned.
pub async fn cancelable_future<T>(
    future: impl Future<Output = T>,
    cancel: impl Borrow<TaskHandle>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.borrow().canceled() => {
            None
        }
        res = future => {
            Some(res)
        }
    }
}

#[derive(Default, Debug)]
struct Shared {
    generation: AtomicU32,
    notify: Notify,
}

/// A task controller manages a single logical subtask (for the coordinator:
/// one completion request, or one documentation resolve).
///
/// The controller can be reused: `restart` hands out a handle for a new
/// generation and implicitly cancels every handle of the previous one.
/// Dropping the controller cancels as well, so a session tearing down takes
/// its in-flight provider queries with it.
#[derive(Default, Debug)]
pub struct TaskController {
    shared: Arc<Shared>,
}

impl TaskController {
    pub fn new() -> Self {
        TaskController::default()
    }

    /// Cancels the handles of the current generation.
    pub fn cancel(&mut self) {
        self.shared.generation.fetch_add(1, Relaxed);
        self.shared.notify.notify_waiters();
    }

    /// Starts a new generation, canceling all previously handed out handles.
    pub fn restart(&mut self) -> TaskHandle {
        let generation = self.shared.generation.fetch_add(1, Relaxed) + 1;
        self.shared.notify.notify_waiters();
        TaskHandle {
            shared: self.shared.clone(),
            generation,
        }
    }
}

impl Drop for TaskController {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A cheaply clonable cancellation witness linked to a [`TaskController`]
/// generation.
///
/// Cancellation can be awaited from async code and checked with a single
/// atomic read from sync code, so blocking filter work can bail out between
/// items without ever taking a lock.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    shared: Arc<Shared>,
    generation: u32,
}

impl TaskHandle {
    /// Waits until [`TaskController::cancel`] or [`TaskController::restart`]
    /// is called on the owning controller. Returns immediately if the
    /// generation is already stale.
    pub async fn canceled(&self) {
        let notified = self.shared.notify.notified();
        if !self.is_canceled() {
            notified.await
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.generation != self.shared.generation.load(Relaxed)
    }
}
