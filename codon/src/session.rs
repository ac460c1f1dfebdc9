//! One in-flight completion attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use codon_core::{CompleteOption, Item, KeywordClass};
use codon_event::TaskController;

use crate::source::{Source, SourceResponse};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The recorded results of a single source within a session.
#[derive(Debug, Default)]
pub struct SourceResults {
    pub name: String,
    pub priority: i8,
    pub items: Vec<Item>,
    pub is_incomplete: bool,
    pub finished: bool,
    pub failed: bool,
}

/// A session owns everything belonging to one completion attempt: the
/// immutable option, the ordered source list, the live input, the result
/// sets, and the cancellation token that in-flight queries hang off of.
/// Dropping the session cancels its queries.
pub struct Session {
    pub id: u64,
    /// Bumped for every query wave (initial run, incomplete re-queries) so
    /// responses of a superseded wave are ignored.
    pub epoch: u64,
    pub option: CompleteOption,
    pub keyword: KeywordClass,
    /// The live prefix, growing as the user types.
    pub input: String,
    pub sources: Vec<Arc<dyn Source>>,
    pub results: Vec<SourceResults>,
    /// Outstanding source queries of the current epoch.
    pub pending: usize,
    /// changedtick captured when the popup was last shown; a popup-visible
    /// text change carrying this tick was caused by the popup itself.
    pub changed_tick: Option<u64>,
    pub controller: TaskController,
}

impl Session {
    pub fn new(
        option: CompleteOption,
        keyword: KeywordClass,
        sources: Vec<Arc<dyn Source>>,
    ) -> Session {
        let results = sources
            .iter()
            .map(|source| SourceResults {
                name: source.name().to_string(),
                priority: source.priority(),
                ..SourceResults::default()
            })
            .collect();
        Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            epoch: 0,
            input: option.input.clone(),
            option,
            keyword,
            sources,
            results,
            pending: 0,
            changed_tick: None,
            controller: TaskController::new(),
        }
    }

    /// Whether any source of the current wave is still running.
    pub fn is_completing(&self) -> bool {
        self.pending > 0
    }

    /// Whether any source declared its results a partial view.
    pub fn is_incomplete(&self) -> bool {
        self.results.iter().any(|results| results.is_incomplete)
    }

    pub fn has_items(&self) -> bool {
        self.results.iter().any(|results| !results.items.is_empty())
    }

    pub fn record_response(&mut self, idx: usize, mut response: SourceResponse) {
        let results = &mut self.results[idx];
        for item in &mut response.items {
            item.source = results.name.clone();
            item.priority = results.priority;
        }
        results.items = response.items;
        results.is_incomplete = response.is_incomplete;
        results.finished = true;
        results.failed = false;
    }

    pub fn record_failure(&mut self, idx: usize) {
        let results = &mut self.results[idx];
        results.items.clear();
        results.is_incomplete = false;
        results.finished = true;
        results.failed = true;
    }

    /// A timed out source keeps whatever it returned so far (nothing, with
    /// an all-or-nothing future) but no longer counts as completing.
    pub fn record_timeout(&mut self, idx: usize) {
        let results = &mut self.results[idx];
        results.finished = true;
    }

    /// The union of all recorded result sets, in source priority order.
    pub fn union_items(&self) -> Vec<Item> {
        self.results
            .iter()
            .flat_map(|results| results.items.iter().cloned())
            .collect()
    }

    /// Looks up the session item matching a row the editor handed back.
    pub fn find_item(&self, word: &str) -> Option<&Item> {
        self.results
            .iter()
            .flat_map(|results| results.items.iter())
            .find(|item| item.word == word)
    }
}
