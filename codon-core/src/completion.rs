use serde::{Deserialize, Serialize};

/// Documentation attached to a completion item, either sent up front by the
/// provider or filled in by a later resolve round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    /// Filetype used for highlighting; `None` falls back to the filetype of
    /// the buffer the completion ran in.
    pub filetype: Option<String>,
    pub content: String,
}

/// One completion candidate as produced by a source provider.
///
/// The field set mirrors the editor's popup rows (`word`/`abbr`/`menu`/
/// `kind`/`info` plus the `dup`/`empty`/`icase` flags) so a candidate can be
/// handed to the popup driver without another mapping step. `user_data` is
/// opaque round-trip state owned by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    /// The text inserted on accept.
    pub word: String,
    /// Display label; the popup falls back to `word` when empty.
    pub abbr: String,
    pub menu: String,
    pub kind: String,
    pub info: String,
    pub dup: bool,
    pub empty: bool,
    pub icase: bool,
    pub preselect: bool,
    /// Expands as a snippet on accept; gets the configured indicator suffix.
    pub snippet: bool,
    /// Name of the producing source.
    pub source: String,
    /// Priority of the producing source, stamped when results are recorded.
    pub priority: i8,
    pub filter_text: Option<String>,
    pub sort_text: Option<String>,
    pub user_data: Option<serde_json::Value>,
    pub documentation: Option<Documentation>,
    /// Set once a resolve round-trip completed so it is never re-requested.
    pub resolved: bool,
}

impl Item {
    pub fn filter_text_or_word(&self) -> &str {
        self.filter_text.as_deref().unwrap_or(&self.word)
    }
}

/// The fixed parameters of one completion attempt, captured when the
/// session starts and immutable from then on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompleteOption {
    pub bufnr: u64,
    /// 1-based line of the completion.
    pub linenr: u32,
    /// Byte offset on the line where the completed word starts.
    pub col: usize,
    /// 1-based byte column of the cursor.
    pub colnr: usize,
    /// Text of the line at capture time.
    pub line: String,
    pub filetype: String,
    /// The word prefix already typed when the session started.
    pub input: String,
    #[serde(default)]
    pub trigger_character: Option<char>,
    /// Inputs that must never pop up a menu (e.g. `end` in some setups).
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Restrict the session to a single named source.
    #[serde(default)]
    pub source: Option<String>,
    /// The buffer's `iskeyword` table at capture time.
    #[serde(default)]
    pub iskeyword: String,
}

impl CompleteOption {
    /// The line text from start of line to the cursor.
    pub fn pretext(&self) -> String {
        let end = self.colnr.saturating_sub(1).min(self.line.len());
        String::from_utf8_lossy(&self.line.as_bytes()[..end]).into_owned()
    }

    /// The line text from the cursor to end of line.
    pub fn following(&self) -> String {
        let start = self.colnr.saturating_sub(1).min(self.line.len());
        String::from_utf8_lossy(&self.line.as_bytes()[start..]).into_owned()
    }
}

/// An insert-mode text change reported by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InsertChange {
    pub bufnr: u64,
    /// 1-based line of the cursor.
    pub lnum: u32,
    /// 1-based byte column of the cursor.
    pub col: usize,
    /// Line text from start of line to the cursor.
    pub pre: String,
    /// Monotonic change counter of the buffer.
    pub changedtick: u64,
}
