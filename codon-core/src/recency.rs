use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

/// Last-seen timestamps of committed words, keyed by `(buffer, word)`.
///
/// Writes are append-only and ordering-insensitive, so the map is shared
/// freely between the coordinator and source providers; providers read it
/// to boost recently used words, the coordinator records a commit after the
/// post-accept round-trip.
#[derive(Debug, Clone, Default)]
pub struct Recency {
    inner: Arc<RwLock<HashMap<(u64, String), u64>>>,
}

impl Recency {
    pub fn new() -> Recency {
        Recency::default()
    }

    /// Records that `word` was committed in `bufnr` just now.
    pub fn touch(&self, bufnr: u64, word: &str) {
        let now = epoch_ms();
        self.inner.write().insert((bufnr, word.to_owned()), now);
    }

    /// Epoch milliseconds of the last commit of `word` in `bufnr`, if any.
    pub fn last_used(&self, bufnr: u64, word: &str) -> Option<u64> {
        self.inner
            .read()
            .get(&(bufnr, word.to_owned()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_and_read_back() {
        let recency = Recency::new();
        assert!(recency.last_used(1, "foo").is_none());
        recency.touch(1, "foo");
        assert!(recency.last_used(1, "foo").is_some());
        // a different buffer is a different key
        assert!(recency.last_used(2, "foo").is_none());
        assert_eq!(recency.len(), 1);
    }

    #[test]
    fn touch_overwrites_with_newer_stamp() {
        let recency = Recency::new();
        recency.touch(1, "foo");
        let first = recency.last_used(1, "foo").unwrap();
        recency.touch(1, "foo");
        let second = recency.last_used(1, "foo").unwrap();
        assert!(second >= first);
        assert_eq!(recency.len(), 1);
    }
}
