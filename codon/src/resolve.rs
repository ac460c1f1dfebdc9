//! Debounced resolution of the highlighted item's documentation.
//!
//! Selection changes arrive on every popup movement; resolving each one
//! would spam slow providers. Requests therefore pass through a
//! trailing-edge debounce and only the survivor is resolved, under a token
//! that the next selection (or the session stopping) cancels. The resolve
//! token is independent of the session token so switching rows never
//! cancels the completion queries themselves.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;

use codon_core::Item;
use codon_event::{cancelable_future, send_blocking, AsyncHook, TaskController, TaskHandle};

use crate::bridge::{FloatDocs, FloatingWindow, PumBounds};
use crate::source::Source;

pub struct ResolveHandler {
    last_request: Option<Arc<Item>>,
    resolver: Sender<ResolveEvent>,
}

impl ResolveHandler {
    pub fn new(floating: Arc<dyn FloatingWindow>, debounce: Duration) -> ResolveHandler {
        ResolveHandler {
            last_request: None,
            resolver: ResolveTimeout {
                next_request: None,
                task_controller: TaskController::new(),
                floating,
                debounce,
            }
            .spawn(),
        }
    }

    /// Schedules documentation for the newly highlighted item.
    pub fn request(
        &mut self,
        item: Item,
        source: Arc<dyn Source>,
        bounds: PumBounds,
        filetype: &str,
        keyword: &str,
    ) {
        if self.last_request.as_deref().is_some_and(|prev| *prev == item) {
            return;
        }
        let item = Arc::new(item);
        self.last_request = Some(item.clone());
        send_blocking(
            &self.resolver,
            ResolveEvent::Request(ResolveRequest {
                item,
                source,
                bounds,
                filetype: filetype.to_string(),
                keyword: keyword.to_string(),
            }),
        );
    }

    /// Cancels any scheduled or in-flight resolve and closes the float.
    /// Idempotent.
    pub fn dismiss(&mut self) {
        self.last_request = None;
        send_blocking(&self.resolver, ResolveEvent::Dismiss);
    }
}

enum ResolveEvent {
    Request(ResolveRequest),
    Dismiss,
}

struct ResolveRequest {
    item: Arc<Item>,
    source: Arc<dyn Source>,
    bounds: PumBounds,
    filetype: String,
    keyword: String,
}

struct ResolveTimeout {
    next_request: Option<ResolveRequest>,
    task_controller: TaskController,
    floating: Arc<dyn FloatingWindow>,
    debounce: Duration,
}

impl AsyncHook for ResolveTimeout {
    type Event = ResolveEvent;

    fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant> {
        match event {
            ResolveEvent::Request(request) => {
                if self
                    .next_request
                    .as_ref()
                    .is_some_and(|old| old.item == request.item)
                {
                    timeout
                } else {
                    self.next_request = Some(request);
                    Some(Instant::now() + self.debounce)
                }
            }
            ResolveEvent::Dismiss => {
                self.next_request = None;
                self.task_controller.cancel();
                self.floating.close();
                None
            }
        }
    }

    fn finish_debounce(&mut self) {
        let Some(request) = self.next_request.take() else {
            return;
        };
        let handle = self.task_controller.restart();
        tokio::spawn(request.execute(handle, self.floating.clone()));
    }
}

impl ResolveRequest {
    async fn execute(self, cancel: TaskHandle, floating: Arc<dyn FloatingWindow>) {
        let item = if self.item.resolved {
            (*self.item).clone()
        } else {
            let future = self.source.resolve(&self.item, cancel.clone());
            match cancelable_future(future, &cancel).await {
                None => return,
                Some(Ok(item)) => item,
                Some(Err(err)) => {
                    log::error!("completion resolve request failed: {err}");
                    // mark resolved so it is not requested again
                    let mut item = (*self.item).clone();
                    item.resolved = true;
                    item
                }
            }
        };
        if cancel.is_canceled() {
            floating.close();
            return;
        }
        match docs(&item, &self.filetype, &self.keyword) {
            Some(docs) => floating.show(&docs, self.bounds, &cancel),
            None => floating.close(),
        }
    }
}

static PLAIN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s.,\t-]+$").expect("malformed plain text pattern"));

/// The documentation to float for an item: the resolved documentation if
/// the provider sent one, otherwise the item's `info` classified as plain
/// text or code.
pub fn docs(item: &Item, buffer_filetype: &str, keyword: &str) -> Option<FloatDocs> {
    if let Some(documentation) = &item.documentation {
        return Some(FloatDocs {
            filetype: documentation
                .filetype
                .clone()
                .unwrap_or_else(|| buffer_filetype.to_string()),
            content: documentation.content.clone(),
            keyword: keyword.to_string(),
        });
    }
    if item.info.is_empty() {
        return None;
    }
    let filetype = if PLAIN_TEXT.is_match(&item.info) {
        "txt".to_string()
    } else {
        buffer_filetype.to_string()
    };
    Some(FloatDocs {
        filetype,
        content: item.info.clone(),
        keyword: keyword.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use codon_core::Documentation;

    use super::*;

    fn item(word: &str) -> Item {
        Item {
            word: word.into(),
            ..Item::default()
        }
    }

    #[test]
    fn provider_documentation_wins() {
        let mut resolved = item("foo");
        resolved.info = "fn foo()".into();
        resolved.documentation = Some(Documentation {
            filetype: Some("markdown".into()),
            content: "does things".into(),
        });
        let docs = docs(&resolved, "rust", "@").unwrap();
        assert_eq!(docs.filetype, "markdown");
        assert_eq!(docs.content, "does things");
        assert_eq!(docs.keyword, "@");
    }

    #[test]
    fn plain_info_is_text() {
        let mut plain = item("foo");
        plain.info = "a plain sentence, nothing more.".into();
        assert_eq!(docs(&plain, "rust", "@").unwrap().filetype, "txt");
    }

    #[test]
    fn code_like_info_keeps_the_buffer_filetype() {
        let mut code = item("foo");
        code.info = "fn foo(x: usize) -> bool".into();
        assert_eq!(docs(&code, "rust", "@").unwrap().filetype, "rust");
    }

    #[test]
    fn no_info_no_docs() {
        assert!(docs(&item("foo"), "rust", "@").is_none());
    }
}
