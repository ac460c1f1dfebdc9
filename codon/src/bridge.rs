//! The contract between the coordinator and the editor: the event stream it
//! consumes and the RPC surface it drives.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;

use codon_core::{CompleteOption, Config, InsertChange, Item};
use codon_event::TaskHandle;

use crate::Result;

/// Raw editor events, in the order the editor emitted them. Ordering
/// between events and in-flight queries is *not* guaranteed; every handler
/// re-validates against the session state.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A key was pressed in insert mode, before the text change lands.
    InsertCharPre { character: char },
    InsertEnter { bufnr: u64 },
    InsertLeave,
    /// Insert-mode text change with the popup hidden.
    TextChangedI { change: InsertChange },
    /// Insert-mode text change with the popup visible.
    TextChangedP { change: InsertChange },
    /// The editor closed the popup; `item` is the committed row, if any.
    CompleteDone { item: Option<Item> },
    /// The highlighted popup row changed.
    MenuPopupChanged { event: PumEvent },
    /// Completion was requested explicitly.
    ManualTrigger { bufnr: u64 },
    BufAttach {
        bufnr: u64,
        filetype: String,
        iskeyword: String,
        uri: String,
    },
    BufDetach { bufnr: u64 },
    /// Swap the live configuration without restarting the session.
    ConfigChanged { config: Config },
}

/// Payload of a popup selection change.
#[derive(Debug, Clone, PartialEq)]
pub struct PumEvent {
    pub completed_item: Option<Item>,
    pub col: u32,
    pub row: u32,
    pub height: u32,
    pub width: u32,
    pub scrollbar: bool,
}

impl PumEvent {
    pub fn bounds(&self) -> PumBounds {
        PumBounds {
            col: self.col,
            row: self.row,
            height: self.height,
            width: self.width,
            scrollbar: self.scrollbar,
        }
    }
}

/// Geometry of the popup, used to place the documentation float next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumBounds {
    pub col: u32,
    pub row: u32,
    pub height: u32,
    pub width: u32,
    pub scrollbar: bool,
}

/// One row of the popup as sent over the wire. Flags are numeric because
/// that is what the editor's popup API takes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PumItem {
    pub word: String,
    pub abbr: String,
    pub menu: String,
    pub kind: String,
    pub info: String,
    pub dup: u8,
    pub empty: u8,
    pub icase: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

/// Editor-bound notifications. A `Vec` of these handed to
/// [`EditorBridge::notify`] must be applied by the editor as one atomic
/// batch, so a stop never leaves a half-torn-down popup visible.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PumShow {
        /// 1-based byte column the popup is anchored to.
        col: usize,
        items: Vec<PumItem>,
        /// Index of the preselected row, -1 for none.
        preselect: i32,
    },
    PumHide,
    SetCandidates(Vec<PumItem>),
    SetCompleteopt(String),
    RestoreCompleteopt,
    MapNumberSelect,
    UnmapNumberSelect,
    SetLine { lnum: u32, text: String },
    Cursor { lnum: u32, col: usize },
    ShowError(String),
}

/// Documentation payload for the floating window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatDocs {
    /// Filetype for highlighting; `txt` for plain text.
    pub filetype: String,
    pub content: String,
    /// `iskeyword` value the float buffer should use.
    pub keyword: String,
}

/// Handle to the single documentation float. `show` replaces the current
/// content; `close` is idempotent.
pub trait FloatingWindow: Send + Sync {
    fn show(&self, docs: &FloatDocs, bounds: PumBounds, cancel: &TaskHandle);
    fn close(&self);
}

/// The editor connection. Notifications are fire-and-forget; queries
/// round-trip to the editor and therefore suspend.
pub trait EditorBridge: Send + Sync + 'static {
    /// Applies a batch of notifications atomically.
    fn notify(&self, batch: Vec<Notification>);

    /// Queries the completion position under the cursor; `None` when the
    /// editor has nothing to complete there.
    fn get_complete_option(&self, bufnr: u64) -> BoxFuture<'static, Result<Option<CompleteOption>>>;

    /// The current line text from start of line to cursor.
    fn pretext(&self, bufnr: u64) -> BoxFuture<'static, Result<String>>;

    /// Flushes pending edits and returns the buffer's current changedtick.
    fn synchronize(&self, bufnr: u64) -> BoxFuture<'static, Result<u64>>;

    fn pum_visible(&self) -> BoxFuture<'static, Result<bool>>;

    fn floating(&self) -> Arc<dyn FloatingWindow>;

    /// Whether this is the native editor build; legacy editors get a longer
    /// selection debounce.
    fn is_native(&self) -> bool {
        true
    }
}
