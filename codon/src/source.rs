//! The capability interface completion sources implement.

use futures_util::future::BoxFuture;
use regex::Regex;

use codon_core::{CompleteOption, Item, Recency};
use codon_event::TaskHandle;

/// Sources at or above this priority count against the high-priority item
/// limit instead of the low-priority one.
pub const HIGH_PRIORITY: i8 = 90;

/// What makes a source want to complete at a given position: literal
/// suffixes of the cursor prefix, or regular expressions matched against
/// it.
#[derive(Debug, Clone, Default)]
pub struct Triggers {
    pub characters: Vec<String>,
    pub patterns: Vec<Regex>,
}

impl Triggers {
    pub fn none() -> Triggers {
        Triggers::default()
    }

    pub fn characters<S: Into<String>>(characters: impl IntoIterator<Item = S>) -> Triggers {
        Triggers {
            characters: characters.into_iter().map(Into::into).collect(),
            patterns: Vec::new(),
        }
    }

    pub fn matches(&self, pre: &str) -> bool {
        self.characters
            .iter()
            .any(|ch| !ch.is_empty() && pre.ends_with(ch.as_str()))
            || self.patterns.iter().any(|pattern| pattern.is_match(pre))
    }
}

/// One completion query as handed to a source.
#[derive(Debug, Clone)]
pub struct CompleteRequest {
    pub option: CompleteOption,
    /// The live prefix; equals `option.input` on the first query and grows
    /// when an incomplete source is re-queried.
    pub input: String,
    pub recency: Recency,
    /// Fires when the session is cancelled; the source must stop emitting.
    pub handle: TaskHandle,
}

#[derive(Debug, Clone, Default)]
pub struct SourceResponse {
    pub items: Vec<Item>,
    /// The returned set is a partial view and must be re-queried when the
    /// prefix grows.
    pub is_incomplete: bool,
}

/// A completion source provider.
///
/// Sources are queried in priority order with a per-source timeout; a
/// failing or timed out source is dropped for the session while the others
/// continue.
pub trait Source: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn priority(&self) -> i8 {
        0
    }

    /// Whether this source wants to run at all for the given position.
    fn should_complete(&self, _option: &CompleteOption) -> bool {
        true
    }

    fn triggers(&self, _filetype: &str) -> Triggers {
        Triggers::none()
    }

    fn do_complete(&self, request: CompleteRequest) -> BoxFuture<'static, anyhow::Result<SourceResponse>>;

    /// Whether typing `character` over the highlighted `item` should accept
    /// it.
    fn should_commit(&self, _item: &Item, _character: char) -> bool {
        false
    }

    /// Fills in expensive fields (documentation) for a highlighted item.
    fn resolve(&self, item: &Item, _handle: TaskHandle) -> BoxFuture<'static, anyhow::Result<Item>> {
        let mut item = item.clone();
        Box::pin(async move {
            item.resolved = true;
            Ok(item)
        })
    }

    /// Runs after an item was committed and the buffer settled.
    fn on_complete_done(
        &self,
        _item: &Item,
        _option: &CompleteOption,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
