//! The session coordinator of the codon completion engine.
//!
//! The coordinator sits between an editor (behind the
//! [`bridge::EditorBridge`] trait) and a set of completion
//! [`source::Source`]s. It turns the editor's raw insert-mode events into
//! completion sessions: it decides when a prefix should open the popup,
//! queries the sources in parallel under a cancellation token, re-filters
//! or re-queries as the user keeps typing, resolves documentation for the
//! highlighted row, and tears everything down on commit or cancel.
//!
//! All coordinator state lives in a single task (see
//! [`coordinator::Coordinator::run`]); source queries and resolve
//! round-trips run as spawned tasks that re-enter the coordinator through a
//! dispatch channel and re-check their staleness witnesses before touching
//! editor state. At most one session is ever live.

use thiserror::Error;

pub mod bridge;
pub mod buffers;
pub mod coordinator;
pub mod input;
pub mod pum;
pub mod resolve;
pub mod session;
pub mod source;
pub mod trigger;

pub use coordinator::{spawn, Coordinator};

#[derive(Debug, Error)]
pub enum Error {
    #[error("completion source {name} failed: {source}")]
    Source {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("editor rpc failed: {0}")]
    Rpc(String),
}

pub type Result<T> = std::result::Result<T, Error>;
