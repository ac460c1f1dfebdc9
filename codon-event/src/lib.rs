//! `codon-event` contains the async plumbing shared by the completion
//! coordinator: generation-counted cancellation and the [`AsyncHook`]
//! framework for debounced background handlers.
//!
//! Anything in the engine that reacts to rapid input with a delay (the
//! documentation resolver most of all) runs as an [`AsyncHook`]: a
//! background tokio task fed through a channel that may debounce its
//! events before acting on them. Asynchronous work is tied to a
//! [`TaskController`]; restarting the controller cancels every task of the
//! previous generation, which is how a new keystroke invalidates the
//! queries of the one before it.

pub use cancel::{cancelable_future, TaskController, TaskHandle};
pub use debounce::{send_blocking, AsyncHook};

mod cancel;
mod debounce;
