//! The top-level completion state machine.
//!
//! All coordinator state is owned by a single task. Editor events are
//! handled synchronously; anything that suspends (source queries, RPC
//! round-trips, the post-accept settle) runs as a spawned task that
//! re-enters the coordinator through the job channel. Every such
//! continuation captures its witnesses (insert timestamps, session id and
//! epoch, changedtick) up front and re-checks them once it is back on the
//! coordinator, so a continuation that lost a race never touches editor
//! state.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use codon_core::chars::leading_whitespace;
use codon_core::{
    resume_input, score, AutoTrigger, CompleteOption, Config, InsertChange, Item, KeywordClass,
    Recency,
};
use codon_event::{cancelable_future, TaskController, TaskHandle};

use crate::bridge::{EditorBridge, EditorEvent, Notification, PumEvent};
use crate::buffers::BufferRegistry;
use crate::input::InsertTracker;
use crate::pum;
use crate::resolve::ResolveHandler;
use crate::session::Session;
use crate::source::{CompleteRequest, Source, SourceResponse};
use crate::trigger;

type Job<B> = Box<dyn FnOnce(&mut Coordinator<B>) + Send>;

fn dispatch<B: EditorBridge>(
    tx: &mpsc::UnboundedSender<Job<B>>,
    job: impl FnOnce(&mut Coordinator<B>) + Send + 'static,
) {
    // send only fails when the coordinator is gone, which also makes the
    // job moot
    let _ = tx.send(Box::new(job));
}

enum QueryOutcome {
    Done(SourceResponse),
    Failed(anyhow::Error),
    TimedOut,
}

/// Spawns a coordinator over `bridge` and `sources` and returns the sender
/// the embedder feeds editor events into. Must be called from within a
/// tokio runtime.
pub fn spawn<B: EditorBridge>(
    bridge: Arc<B>,
    sources: Vec<Arc<dyn Source>>,
    config: Config,
) -> mpsc::Sender<EditorEvent> {
    let (tx, rx) = mpsc::channel(128);
    let coordinator = Coordinator::new(bridge, sources, config);
    tokio::spawn(coordinator.run(rx));
    tx
}

pub struct Coordinator<B: EditorBridge> {
    bridge: Arc<B>,
    config: Arc<ArcSwap<Config>>,
    sources: Vec<Arc<dyn Source>>,
    recency: Recency,
    buffers: BufferRegistry,
    tracker: InsertTracker,
    /// Line text up to the cursor as of the latest event.
    pretext: String,
    current_item: Option<Item>,
    session: Option<Session>,
    resolve: ResolveHandler,
    jobs_tx: mpsc::UnboundedSender<Job<B>>,
    jobs_rx: mpsc::UnboundedReceiver<Job<B>>,
    completeopt_pushed: bool,
    number_select_mapped: bool,
}

impl<B: EditorBridge> Coordinator<B> {
    pub fn new(bridge: Arc<B>, sources: Vec<Arc<dyn Source>>, config: Config) -> Coordinator<B> {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let debounce = if bridge.is_native() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(200)
        };
        let resolve = ResolveHandler::new(bridge.floating(), debounce);
        Coordinator {
            bridge,
            config: Arc::new(ArcSwap::from_pointee(config)),
            sources,
            recency: Recency::new(),
            buffers: BufferRegistry::default(),
            tracker: InsertTracker::new(),
            pretext: String::new(),
            current_item: None,
            session: None,
            resolve,
            jobs_tx,
            jobs_rx,
            completeopt_pushed: false,
            number_select_mapped: false,
        }
    }

    /// Runs the coordinator until the event stream closes. Jobs queued by
    /// background tasks take priority over new editor events so
    /// continuations observe the state they were dispatched against as
    /// early as possible.
    pub async fn run(mut self, mut events: mpsc::Receiver<EditorEvent>) {
        enum Step<B: EditorBridge> {
            Job(Job<B>),
            Event(EditorEvent),
            Quit,
        }
        loop {
            let step = tokio::select! {
                biased;
                job = self.jobs_rx.recv() => match job {
                    Some(job) => Step::Job(job),
                    None => Step::Quit,
                },
                event = events.recv() => match event {
                    Some(event) => Step::Event(event),
                    None => Step::Quit,
                },
            };
            match step {
                Step::Job(job) => job(&mut self),
                Step::Event(event) => self.handle_event(event),
                Step::Quit => break,
            }
        }
    }

    /// Processes queued background jobs until the coordinator has been
    /// quiet for `window`. Embedders that drive `handle_event` manually
    /// (tests, synchronous hosts) use this to reach a settled state.
    pub async fn settle(&mut self, window: Duration) {
        loop {
            let job = tokio::time::timeout(window, self.jobs_rx.recv()).await;
            match job {
                Ok(Some(job)) => job(self),
                Ok(None) | Err(_) => break,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.current_item.as_ref()
    }

    pub fn session_input(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.input.as_str())
    }

    pub fn recency(&self) -> &Recency {
        &self.recency
    }

    pub fn handle_event(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::InsertCharPre { character } => self.tracker.record_char(character),
            EditorEvent::InsertEnter { bufnr } => self.on_insert_enter(bufnr),
            EditorEvent::InsertLeave => {
                self.tracker.record_leave();
                self.stop();
            }
            EditorEvent::TextChangedI { change } => {
                self.buffers.record_tick(change.bufnr, change.changedtick);
                self.on_user_edit(change);
            }
            EditorEvent::TextChangedP { change } => {
                self.buffers.record_tick(change.bufnr, change.changedtick);
                self.on_popup_edit(change);
            }
            EditorEvent::CompleteDone { item } => self.on_complete_done(item),
            EditorEvent::MenuPopupChanged { event } => self.on_pum_change(event),
            EditorEvent::ManualTrigger { bufnr } => self.on_manual_trigger(bufnr),
            EditorEvent::BufAttach {
                bufnr,
                filetype,
                iskeyword,
                uri,
            } => self.buffers.attach(bufnr, filetype, &iskeyword, uri),
            EditorEvent::BufDetach { bufnr } => self.buffers.detach(bufnr),
            EditorEvent::ConfigChanged { config } => self.config.store(Arc::new(config)),
        }
    }

    fn on_insert_enter(&mut self, bufnr: u64) {
        let config = self.config.load();
        if !(config.trigger_after_insert_enter && config.auto_trigger == AutoTrigger::Always) {
            return;
        }
        let witness = self.tracker.witness();
        let future = self.bridge.pretext(bufnr);
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(pre) => dispatch(&tx, move |coord| {
                    if coord.tracker.witness() != witness {
                        return;
                    }
                    coord.pretext = pre.clone();
                    if coord.should_trigger_now(bufnr, &pre) {
                        coord.trigger_completion(bufnr);
                    }
                }),
                Err(err) => dispatch(&tx, move |coord| coord.on_rpc_error(&err)),
            }
        });
    }

    fn on_user_edit(&mut self, change: InsertChange) {
        self.pretext = change.pre.clone();
        let fresh = self.tracker.latest_insert_char();
        self.tracker.clear_last_insert();

        let Some((linenr, col)) = self
            .session
            .as_ref()
            .map(|session| (session.option.linenr, session.option.col))
        else {
            // Idle: only user keystrokes may open a session
            if fresh.is_none() {
                return;
            }
            if self.should_trigger_now(change.bufnr, &change.pre) {
                self.trigger_completion(change.bufnr);
            }
            return;
        };

        // Cursor left the session position (other line, or at/before the
        // word start; the cursor-equal case counts as "before").
        if change.lnum != linenr || change.col.saturating_sub(1) <= col {
            if self.should_trigger_now(change.bufnr, &change.pre) {
                self.trigger_completion(change.bufnr);
            } else {
                self.stop();
            }
            return;
        }

        if self.try_commit_character(&change, fresh) {
            return;
        }

        if self.should_trigger_now(change.bufnr, &change.pre) {
            self.trigger_completion(change.bufnr);
            return;
        }
        self.resume_completion(false);
    }

    fn on_popup_edit(&mut self, change: InsertChange) {
        self.pretext = change.pre.clone();
        let Some((changed_tick, session_indent)) = self
            .session
            .as_ref()
            .map(|session| (
                session.changed_tick,
                leading_whitespace(&session.option.line).to_string(),
            ))
        else {
            return;
        };
        // the popup inserting the selected word bumps the tick we recorded
        // at show time; that change must not re-filter
        if changed_tick == Some(change.changedtick) {
            return;
        }
        if leading_whitespace(&change.pre) != session_indent {
            self.stop();
            return;
        }
        if self.tracker.latest_insert().is_none() {
            return;
        }
        if self.should_trigger_now(change.bufnr, &change.pre) {
            self.trigger_completion(change.bufnr);
            return;
        }
        self.resume_completion(false);
    }

    fn on_pum_change(&mut self, event: PumEvent) {
        if self.session.is_none() {
            return;
        }
        // rows coming back from the editor are stripped down; swap in the
        // full session item so the resolve sees documentation and source
        let bounds = event.bounds();
        let item = event
            .completed_item
            .filter(|item| !item.word.is_empty())
            .map(|item| {
                self.session
                    .as_ref()
                    .and_then(|session| session.find_item(&item.word).cloned())
                    .unwrap_or(item)
            });
        self.current_item = item.clone();
        let Some(item) = item else {
            self.resolve.dismiss();
            return;
        };
        let Some(source) = self.source_by_name(&item.source) else {
            self.resolve.dismiss();
            return;
        };
        let filetype = self
            .session
            .as_ref()
            .map(|session| session.option.filetype.clone())
            .unwrap_or_default();
        let config = self.config.load();
        self.resolve.request(
            item,
            source,
            bounds,
            &filetype,
            &config.preview_is_keyword,
        );
    }

    fn on_complete_done(&mut self, item: Option<Item>) {
        if self.session.is_none() {
            return;
        }
        self.current_item = None;
        self.resolve.dismiss();

        let Some(done) = item.filter(|item| !item.word.is_empty()) else {
            self.stop();
            return;
        };
        let Some((matched, option)) = self.session.as_ref().and_then(|session| {
            let matched = session.find_item(&done.word)?.clone();
            Some((matched, session.option.clone()))
        }) else {
            self.stop();
            return;
        };
        let Some(source) = self.source_by_name(&matched.source) else {
            self.stop();
            return;
        };
        let witness = self.tracker.witness();
        let wait = self.config.load().post_commit_wait;
        self.stop();

        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            // the post-accept resolve gets its own token; nothing should be
            // able to cancel it except the task being dropped
            let mut controller = TaskController::new();
            let handle = controller.restart();
            let resolved = match source.resolve(&matched, handle).await {
                Ok(item) => item,
                Err(err) => {
                    log::error!("post-accept resolve failed: {err}");
                    matched.clone()
                }
            };
            tokio::time::sleep(Duration::from_millis(wait)).await;
            dispatch(&tx, move |coord| {
                // typing or leaving insert mode during the wait aborts
                if coord.tracker.witness() != witness {
                    return;
                }
                let future = coord.bridge.pretext(option.bufnr);
                let tx = coord.jobs_tx.clone();
                tokio::spawn(async move {
                    let Ok(pre) = future.await else {
                        return;
                    };
                    dispatch(&tx, move |coord| {
                        if !pre.ends_with(&resolved.word) {
                            coord.stop();
                            return;
                        }
                        let word = resolved.word.clone();
                        let name = resolved.source.clone();
                        let done = source.on_complete_done(&resolved, &option);
                        tokio::spawn(async move {
                            if let Err(err) = done.await {
                                log::error!("source {name} post-accept hook failed: {err}");
                            }
                        });
                        coord.recency.touch(option.bufnr, &word);
                        coord.stop();
                    });
                });
            });
        });
    }

    fn on_manual_trigger(&mut self, bufnr: u64) {
        let future = self.bridge.pum_visible();
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            let visible = future.await.unwrap_or(false);
            dispatch(&tx, move |coord| {
                if visible && coord.is_active() {
                    return;
                }
                coord.trigger_completion(bufnr);
            });
        });
    }

    /// Whether the trigger policy opens a session for `pre` in `bufnr`.
    fn should_trigger_now(&self, bufnr: u64, pre: &str) -> bool {
        let Some(meta) = self.buffers.get(bufnr) else {
            return false;
        };
        if meta.is_command_line() {
            return false;
        }
        let config = self.config.load();
        trigger::should_trigger(
            pre,
            &meta.filetype,
            &meta.keyword,
            &config,
            &self.sources,
            self.session.is_some(),
        )
    }

    /// Queries the editor for the completion position and starts a session
    /// there. The start is abandoned when more input arrived while the
    /// query was in flight.
    fn trigger_completion(&mut self, bufnr: u64) {
        let witness = self.tracker.witness();
        let future = self.bridge.get_complete_option(bufnr);
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(Some(option)) => dispatch(&tx, move |coord| {
                    if coord.tracker.witness() != witness {
                        return;
                    }
                    coord.start_completion(option);
                }),
                Ok(None) => (),
                Err(err) => dispatch(&tx, move |coord| {
                    log::error!("failed to fetch completion position: {err}");
                    coord
                        .bridge
                        .notify(vec![Notification::ShowError(format!("Complete error: {err}"))]);
                    coord.stop();
                }),
            }
        });
    }

    fn start_completion(&mut self, option: CompleteOption) {
        if let Some(meta) = self.buffers.get(option.bufnr) {
            if meta.is_command_line() {
                return;
            }
        }
        if option.blacklist.iter().any(|entry| *entry == option.input) {
            return;
        }
        let keyword = if option.iskeyword.is_empty() {
            self.buffers
                .get(option.bufnr)
                .map(|meta| meta.keyword.clone())
                .unwrap_or_else(KeywordClass::standard)
        } else {
            KeywordClass::parse(&option.iskeyword)
        };
        let sources: Vec<Arc<dyn Source>> = match &option.source {
            Some(name) => self
                .sources
                .iter()
                .filter(|source| source.name() == name)
                .cloned()
                .collect(),
            None => {
                let mut sources: Vec<_> = self
                    .sources
                    .iter()
                    .filter(|source| source.should_complete(&option))
                    .cloned()
                    .collect();
                sources.sort_by_key(|source| std::cmp::Reverse(source.priority()));
                sources
            }
        };
        if sources.is_empty() {
            return;
        }

        // dispose any previous session before installing the new one
        self.stop();

        let config = self.config.load_full();
        if !config.keep_completeopt {
            self.bridge
                .notify(vec![Notification::SetCompleteopt(config.completeopt())]);
            self.completeopt_pushed = true;
        }

        self.pretext = option.pretext();
        let mut session = Session::new(option, keyword, sources);
        let handle = session.controller.restart();
        self.session = Some(session);
        self.query_sources(handle, false);
    }

    /// Fires `do_complete` on the session's sources (all of them, or only
    /// the incomplete ones on a re-query) and routes each outcome back as a
    /// job tagged with the session id and epoch.
    fn query_sources(&mut self, handle: TaskHandle, only_incomplete: bool) {
        let config = self.config.load_full();
        let recency = self.recency.clone();
        let jobs_tx = self.jobs_tx.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let sid = session.id;
        let epoch = session.epoch;
        let option = session.option.clone();
        let search = session.input.clone();
        let indices: Vec<usize> = if only_incomplete {
            session
                .results
                .iter()
                .enumerate()
                .filter(|(_, results)| results.is_incomplete)
                .map(|(idx, _)| idx)
                .collect()
        } else {
            (0..session.sources.len()).collect()
        };
        for idx in indices {
            let source = session.sources[idx].clone();
            session.pending += 1;
            session.results[idx].finished = false;
            let request = CompleteRequest {
                option: option.clone(),
                input: search.clone(),
                recency: recency.clone(),
                handle: handle.clone(),
            };
            let future = source.do_complete(request);
            let timeout = Duration::from_millis(config.timeout);
            let name = source.name().to_string();
            let handle = handle.clone();
            let tx = jobs_tx.clone();
            tokio::spawn(async move {
                let outcome =
                    match cancelable_future(tokio::time::timeout(timeout, future), &handle).await {
                        // session cancelled; nobody is waiting for this
                        None => return,
                        Some(Err(_)) => QueryOutcome::TimedOut,
                        Some(Ok(Err(err))) => QueryOutcome::Failed(err),
                        Some(Ok(Ok(response))) => QueryOutcome::Done(response),
                    };
                dispatch(&tx, move |coord| {
                    coord.on_source_outcome(sid, epoch, idx, &name, outcome)
                });
            });
        }
    }

    fn on_source_outcome(
        &mut self,
        sid: u64,
        epoch: u64,
        idx: usize,
        name: &str,
        outcome: QueryOutcome,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.id != sid || session.epoch != epoch {
            return;
        }
        session.pending = session.pending.saturating_sub(1);
        match outcome {
            QueryOutcome::Done(response) => session.record_response(idx, response),
            QueryOutcome::Failed(err) => {
                let err = crate::Error::Source {
                    name: name.to_string(),
                    source: err,
                };
                log::error!("{err}");
                session.record_failure(idx);
            }
            QueryOutcome::TimedOut => {
                log::warn!("completion source {name} timed out");
                session.record_timeout(idx);
            }
        }
        let completing = session.is_completing();
        if !session.has_items() {
            if !completing {
                self.stop();
            }
            return;
        }
        // the first arriving result set opens the popup early; later ones
        // refresh it
        self.show_completion();
    }

    fn show_completion(&mut self) {
        let config = self.config.load_full();
        let recency = self.recency.clone();
        let (items, completing) = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            let items = score::filter_items(
                session.union_items(),
                &session.input,
                &session.option,
                &recency,
                &config,
            );
            (items, session.is_completing())
        };
        if items.is_empty() {
            if !completing {
                self.stop();
            }
            return;
        }
        let tick = self
            .session
            .as_ref()
            .and_then(|session| self.buffers.get(session.option.bufnr))
            .map(|meta| meta.changedtick);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.changed_tick = tick;
        let view = pum::render(&items, &session.option, &session.keyword, &config);
        let col = session.option.col + 1;
        let mut batch = Vec::new();
        if view.number_select && !self.number_select_mapped {
            self.number_select_mapped = true;
            batch.push(Notification::MapNumberSelect);
        }
        batch.push(Notification::PumShow {
            col,
            items: view.rows,
            preselect: view.preselect,
        });
        self.bridge.notify(batch);
    }

    /// Re-filters or re-queries after the pretext changed under a live
    /// session.
    fn resume_completion(&mut self, force: bool) {
        let Some((col, live_input, original_input, blacklist)) =
            self.session.as_ref().map(|session| {
                (
                    session.option.col,
                    session.input.clone(),
                    session.option.input.clone(),
                    session.option.blacklist.clone(),
                )
            })
        else {
            return;
        };
        let Some(search) = resume_input(&self.pretext, col, &blacklist) else {
            self.stop();
            return;
        };
        if !force && search == live_input {
            return;
        }
        if search.is_empty()
            || search.chars().last().is_some_and(char::is_whitespace)
            || !search.starts_with(&original_input)
        {
            self.stop();
            return;
        }
        let incomplete = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            session.input = search;
            session.is_incomplete()
        };
        if incomplete {
            self.requery_incomplete();
        } else {
            self.show_completion();
        }
    }

    /// Re-queries the incomplete sources once the document is in sync.
    fn requery_incomplete(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let sid = session.id;
        let bufnr = session.option.bufnr;
        session.epoch += 1;
        session.pending = 0;
        let epoch = session.epoch;
        let handle = session.controller.restart();
        let future = self.bridge.synchronize(bufnr);
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(tick) => dispatch(&tx, move |coord| {
                    let stale = coord
                        .session
                        .as_ref()
                        .map_or(true, |session| session.id != sid || session.epoch != epoch);
                    if stale || handle.is_canceled() {
                        return;
                    }
                    // the document moved on while syncing; the next
                    // TextChangedI will resume again
                    let known = coord.buffers.get(bufnr).map(|meta| meta.changedtick);
                    if known.is_some_and(|known| known != tick) {
                        return;
                    }
                    coord.buffers.record_tick(bufnr, tick);
                    coord.query_sources(handle, true);
                }),
                Err(err) => dispatch(&tx, move |coord| coord.on_rpc_error(&err)),
            }
        });
    }

    /// Accepts the highlighted item because a commit character was typed
    /// over it: rewrite the line with the word plus the typed character and
    /// park the cursor after them. Returns whether the commit happened.
    fn try_commit_character(&mut self, change: &InsertChange, fresh: Option<char>) -> bool {
        let config = self.config.load();
        if !config.accept_suggestion_on_commit_character || fresh.is_none() {
            return false;
        }
        let Some(item) = self.current_item.clone() else {
            return false;
        };
        let Some(last) = change.pre.chars().last() else {
            return false;
        };
        let Some(source) = self.source_by_name(&item.source) else {
            return false;
        };
        if !source.should_commit(&item, last) {
            return false;
        }
        let Some(option) = self.session.as_ref().map(|session| session.option.clone()) else {
            return false;
        };

        let bytes = option.line.as_bytes();
        let head = option.col.min(bytes.len());
        let tail = option.colnr.saturating_sub(1).min(bytes.len());
        let mut text = String::with_capacity(option.line.len() + item.word.len() + last.len_utf8());
        text.push_str(&String::from_utf8_lossy(&bytes[..head]));
        text.push_str(&item.word);
        text.push(last);
        text.push_str(&String::from_utf8_lossy(&bytes[tail..]));

        self.stop();
        self.bridge.notify(vec![
            Notification::SetLine {
                lnum: option.linenr,
                text,
            },
            Notification::Cursor {
                lnum: option.linenr,
                col: option.col + item.word.len() + 2,
            },
        ]);
        true
    }

    /// Tears the session down. Idempotent; everything the session put up
    /// (popup, candidate list, completeopt, digit maps) is withdrawn in one
    /// atomic batch.
    pub fn stop(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.current_item = None;
        self.resolve.dismiss();
        // dropping the session cancels its in-flight source queries
        self.session = None;
        let mut batch = Vec::new();
        if self.number_select_mapped {
            self.number_select_mapped = false;
            batch.push(Notification::UnmapNumberSelect);
        }
        if self.completeopt_pushed {
            self.completeopt_pushed = false;
            batch.push(Notification::RestoreCompleteopt);
        }
        batch.push(Notification::SetCandidates(Vec::new()));
        batch.push(Notification::PumHide);
        self.bridge.notify(batch);
    }

    fn on_rpc_error(&mut self, err: &crate::Error) {
        log::error!("editor rpc failed: {err}");
        self.stop();
    }

    fn source_by_name(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.sources
            .iter()
            .find(|source| source.name() == name)
            .cloned()
    }
}
