//! Filtering and re-ranking of cached completion items against the live
//! input, used whenever the prefix grows without any source needing a
//! re-query.

use std::cmp::Ordering;

use nucleo::pattern::{Atom, AtomKind, CaseMatching, Normalization};
use nucleo::{Matcher, Utf32Str};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::completion::{CompleteOption, Item};
use crate::config::{Config, SortMethod};
use crate::recency::{epoch_ms, Recency};

// One matcher is enough: candidate lists are small and scored on the
// calling thread, so the lock is never contended in practice.
static MATCHER: Lazy<Mutex<Matcher>> = Lazy::new(Mutex::default);

/// Recency influence fades out after this long.
const RECENCY_WINDOW_MS: u64 = 10 * 60 * 1000;

/// Match scores are shifted left by this much so the locality and recency
/// bonuses act as tie-breaks between equal matches, not as overrides.
const BONUS_BITS: u32 = 6;

/// Filters `items` down to those matching `input` and orders them by match
/// quality, locality, recency and the configured tie-break. With an empty
/// input every item is kept in provider order (modulo preselect).
pub fn filter_items(
    items: Vec<Item>,
    input: &str,
    option: &CompleteOption,
    recency: &Recency,
    config: &Config,
) -> Vec<Item> {
    let mut matcher = MATCHER.lock();
    let pattern = (!input.is_empty()).then(|| {
        (
            Atom::new(
                input,
                CaseMatching::Smart,
                Normalization::Smart,
                AtomKind::Fuzzy,
                false,
            ),
            Atom::new(
                input,
                CaseMatching::Ignore,
                Normalization::Smart,
                AtomKind::Fuzzy,
                false,
            ),
        )
    });

    let now = epoch_ms();
    let mut buf = Vec::new();
    let mut ranked: Vec<(u32, Item)> = Vec::with_capacity(items.len());
    for item in items {
        let base = match &pattern {
            None => 0,
            Some((smart, ignore)) => {
                let atom = if item.icase { ignore } else { smart };
                let haystack = Utf32Str::new(item.filter_text_or_word(), &mut buf);
                match atom.score(haystack, &mut matcher) {
                    Some(score) => score as u32,
                    None => continue,
                }
            }
        };
        let mut score = base << BONUS_BITS;
        if config.locality_bonus && !item.word.is_empty() && option.line.contains(&item.word) {
            score += 1 << (BONUS_BITS - 1);
        }
        if let Some(at) = recency.last_used(option.bufnr, &item.word) {
            let age = now.saturating_sub(at);
            if age < RECENCY_WINDOW_MS {
                let fade = (RECENCY_WINDOW_MS - age) as u128;
                score += ((fade << (BONUS_BITS - 1)) / RECENCY_WINDOW_MS as u128) as u32;
            }
        }
        ranked.push((score, item));
    }

    ranked.sort_by(|(score_a, a), (score_b, b)| {
        b.preselect
            .cmp(&a.preselect)
            .then(score_b.cmp(score_a))
            .then(b.priority.cmp(&a.priority))
            .then_with(|| match (&a.sort_text, &b.sort_text) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => Ordering::Equal,
            })
            .then_with(|| match config.default_sort_method {
                SortMethod::Alphabetical => a.word.cmp(&b.word),
                SortMethod::Length => a.word.len().cmp(&b.word.len()),
                SortMethod::None => Ordering::Equal,
            })
    });

    ranked.into_iter().map(|(_, item)| item).collect()
}
