//! Sync engine: keeps a local mirror of the remote message collection.
//!
//! The store is the single source of truth. Every applied fetch replaces the
//! local view wholesale; nothing is merged, patched or re-sorted.
//!
//! Polling is single-flight: the next fetch is scheduled one interval after
//! the previous one completes (or times out), never on a free-running timer.
//! Fetches can still overlap when a submit triggers its own refresh, so every
//! fetch takes a dispatch number and a response is only applied when it was
//! dispatched after the one currently on screen. Late, older responses are
//! dropped as stale.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::api::{Transport, TransportError};
use crate::config::{Config, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::models::Message;
use crate::session::Identity;

/// Loading indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No fetch has completed yet.
    Loading,
    /// At least one fetch completed, successfully or not.
    Ready,
}

/// Timing knobs for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// What happened to one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the view.
    Applied,
    /// A fetch dispatched later was already applied; response dropped.
    Stale,
    /// Transport error; view left as it was.
    Failed,
    /// Resolved after the engine stopped; ignored.
    Discarded,
}

/// What happened to one submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty text or no username (or engine stopped). Transport not called.
    Rejected,
    /// Store write failed; nothing else happened.
    Failed,
    /// Store accepted the message and one refresh followed.
    Sent,
}

/// Point-in-time copy of the engine's view.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub messages: Vec<Message>,
    /// Error from the most recent failed refresh, cleared by the next success.
    pub last_error: Option<String>,
}

struct ViewState {
    phase: Phase,
    messages: Vec<Message>,
    /// Dispatch number of the response currently on screen (0 = none).
    applied_seq: u64,
    last_error: Option<String>,
    stopped: bool,
}

struct Shared<T> {
    transport: T,
    identity: Identity,
    settings: SyncSettings,
    state: Mutex<ViewState>,
    dispatched: AtomicU64,
    /// Bumped whenever the visible state changes.
    revision: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the sync engine. Clones share the same view.
pub struct SyncEngine<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport + 'static> SyncEngine<T> {
    /// Create an engine in `Loading` with an empty view. Nothing is fetched
    /// until `start()` or `refresh()` is called.
    pub fn new(transport: T, identity: Identity, settings: SyncSettings) -> Self {
        let (revision, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                transport,
                identity,
                settings,
                state: Mutex::new(ViewState {
                    phase: Phase::Loading,
                    messages: Vec::new(),
                    applied_seq: 0,
                    last_error: None,
                    stopped: false,
                }),
                dispatched: AtomicU64::new(0),
                revision,
                shutdown,
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock_state().phase
    }

    /// Current view, in store order.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock_state().messages.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock_state();
        Snapshot {
            phase: state.phase,
            messages: state.messages.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Whether the message was written under the current session username.
    pub fn is_own(&self, message: &Message) -> bool {
        self.shared.identity.owns(message)
    }

    /// Receiver that changes whenever the view, phase or error status does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock_state().stopped
    }

    /// Spawn the poll loop: one immediate fetch, then one per interval.
    ///
    /// Calling it again while running, or after `stop()`, does nothing.
    pub fn start(&self) {
        let mut poller = self
            .shared
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if poller.is_some() || self.is_stopped() {
            tracing::debug!("Sync engine already started or stopped, ignoring start");
            return;
        }

        let shutdown = self.shared.shutdown.subscribe();
        let engine = self.clone();
        *poller = Some(tokio::spawn(engine.poll_loop(shutdown)));

        tracing::info!(
            "Sync engine started (poll every {}ms)",
            self.shared.settings.poll_interval.as_millis()
        );
    }

    /// Cancel the poll loop. Responses that arrive afterwards are ignored.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.lock_state();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.shared.shutdown.send_replace(true);

        let handle = self
            .shared
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!("Poll loop panicked: {}", e);
                }
            }
        }

        tracing::info!("Sync engine stopped");
    }

    /// Dispatch one fetch outside the poll cadence.
    ///
    /// The dispatch number is taken when this is called, not when the
    /// returned future is first polled.
    pub fn refresh(&self) -> impl Future<Output = RefreshOutcome> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let seq = shared.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        async move { shared.fetch(seq).await }
    }

    /// Send a message as the current user, then refresh once.
    ///
    /// Blank text or an unset username drops the submit silently.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let username = self.shared.identity.get();
        if username.is_empty() || text.trim().is_empty() {
            tracing::debug!("Dropping submit: username or text is empty");
            return SubmitOutcome::Rejected;
        }
        if self.is_stopped() {
            tracing::debug!("Dropping submit: engine stopped");
            return SubmitOutcome::Rejected;
        }

        let sent = time::timeout(
            self.shared.settings.request_timeout,
            self.shared.transport.submit(&username, text),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout));

        match sent {
            Ok(message) => {
                tracing::debug!("Store accepted message {}", message.id);
                self.refresh().await;
                SubmitOutcome::Sent
            }
            Err(e) => {
                tracing::warn!("Failed to send message: {}", e);
                SubmitOutcome::Failed
            }
        }
    }

    async fn poll_loop(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.refresh() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = time::sleep(self.shared.settings.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Poll loop exited");
    }
}

impl<T: Transport> Shared<T> {
    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fetch(&self, seq: u64) -> RefreshOutcome {
        let result = time::timeout(self.settings.request_timeout, self.transport.fetch_all())
            .await
            .unwrap_or(Err(TransportError::Timeout));
        self.apply(seq, result)
    }

    fn apply(&self, seq: u64, result: Result<Vec<Message>, TransportError>) -> RefreshOutcome {
        let mut state = self.lock_state();
        if state.stopped {
            tracing::debug!("Ignoring fetch #{} that resolved after stop", seq);
            return RefreshOutcome::Discarded;
        }

        let mut changed = state.phase != Phase::Ready;
        state.phase = Phase::Ready;

        let outcome = match result {
            Ok(messages) if seq > state.applied_seq => {
                let messages = unique_by_id(messages);
                changed |= state.messages != messages || state.last_error.is_some();
                state.messages = messages;
                state.applied_seq = seq;
                state.last_error = None;
                RefreshOutcome::Applied
            }
            Ok(_) => {
                tracing::debug!(
                    "Dropping stale fetch #{} (showing #{})",
                    seq,
                    state.applied_seq
                );
                RefreshOutcome::Stale
            }
            Err(e) => {
                tracing::warn!("Failed to refresh messages: {}", e);
                if seq > state.applied_seq {
                    changed = true;
                    state.last_error = Some(e.to_string());
                }
                RefreshOutcome::Failed
            }
        };
        drop(state);

        if changed {
            self.revision.send_modify(|rev| *rev += 1);
        }
        outcome
    }
}

/// Keep the first occurrence of each id, preserving store order.
fn unique_by_id(messages: Vec<Message>) -> Vec<Message> {
    let total = messages.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<Message> = messages
        .into_iter()
        .filter(|m| seen.insert(m.id))
        .collect();
    if unique.len() != total {
        tracing::warn!(
            "Store returned {} duplicate message id(s), keeping first occurrences",
            total - unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{message, MockTransport};
    use crate::models::NewMessage;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn engine(mock: &MockTransport) -> SyncEngine<MockTransport> {
        SyncEngine::new(mock.clone(), Identity::new(), SyncSettings::default())
    }

    fn sample() -> Vec<Message> {
        vec![
            message(1, "alice", "hi"),
            message(2, "bob", "hey alice"),
            message(3, "alice", "how are you?"),
        ]
    }

    #[tokio::test]
    async fn test_starts_loading_and_empty() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        assert_eq!(engine.phase(), Phase::Loading);
        assert!(engine.messages().is_empty());
        assert_eq!(mock.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_fetches_do_not_duplicate() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);

        for _ in 0..5 {
            assert_eq!(engine.refresh().await, RefreshOutcome::Applied);
        }

        assert_eq!(engine.messages(), sample());
        assert_eq!(engine.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_identical_fetches_bump_revision_once() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        let rx = engine.subscribe();

        engine.refresh().await;
        engine.refresh().await;
        engine.refresh().await;

        assert_eq!(*rx.borrow(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapsed() {
        let mock = MockTransport::with_messages(vec![
            message(1, "alice", "hi"),
            message(2, "bob", "yo"),
            message(1, "alice", "hi again"),
        ]);
        let engine = engine(&mock);
        engine.refresh().await;

        let view = engine.messages();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].text, "hi");
        assert_eq!(view[1].text, "yo");
    }

    #[tokio::test]
    async fn test_store_order_is_kept() {
        let reversed: Vec<Message> = sample().into_iter().rev().collect();
        let mock = MockTransport::with_messages(reversed.clone());
        let engine = engine(&mock);
        engine.refresh().await;
        assert_eq!(engine.messages(), reversed);
    }

    #[tokio::test]
    async fn test_ownership_follows_identity_without_refetch() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        engine.refresh().await;
        let calls = mock.fetch_calls();

        let own = |e: &SyncEngine<MockTransport>| -> Vec<u64> {
            e.messages()
                .iter()
                .filter(|m| e.is_own(m))
                .map(|m| m.id.0)
                .collect()
        };

        assert!(own(&engine).is_empty());
        engine.identity().set("alice");
        assert_eq!(own(&engine), vec![1, 3]);
        engine.identity().set("bob");
        assert_eq!(own(&engine), vec![2]);
        engine.identity().set("ALICE");
        assert!(own(&engine).is_empty());

        assert_eq!(mock.fetch_calls(), calls);
    }

    #[tokio::test]
    async fn test_submit_without_identity_is_dropped() {
        let mock = MockTransport::new();
        let engine = engine(&mock);

        assert_eq!(engine.submit("hello").await, SubmitOutcome::Rejected);
        assert!(mock.submitted().is_empty());
        assert_eq!(mock.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_blank_text_is_dropped() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        engine.identity().set("alice");

        for text in ["", "   ", "\n\t "] {
            assert_eq!(engine.submit(text).await, SubmitOutcome::Rejected);
        }
        assert!(mock.submitted().is_empty());
        assert_eq!(mock.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_refreshes_exactly_once() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        engine.identity().set("alice");

        assert_eq!(engine.submit("hello").await, SubmitOutcome::Sent);
        assert_eq!(mock.submitted().len(), 1);
        assert_eq!(mock.fetch_calls(), 1);
        assert_eq!(engine.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_leaves_view_alone() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        engine.identity().set("alice");
        engine.refresh().await;

        mock.fail_next_submit();
        assert_eq!(engine.submit("lost").await, SubmitOutcome::Failed);

        assert_eq!(mock.fetch_calls(), 1);
        assert_eq!(engine.messages(), sample());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_view() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        assert_eq!(engine.refresh().await, RefreshOutcome::Applied);

        mock.set_messages(vec![message(9, "carol", "new")]);
        mock.fail_next_fetch();
        assert_eq!(engine.refresh().await, RefreshOutcome::Failed);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages, sample());
        assert_eq!(snapshot.phase, Phase::Ready);
        assert!(snapshot.last_error.is_some());

        assert_eq!(engine.refresh().await, RefreshOutcome::Applied);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages, vec![message(9, "carol", "new")]);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_first_fetch_failure_clears_loading() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        mock.fail_next_fetch();

        assert_eq!(engine.refresh().await, RefreshOutcome::Failed);
        assert_eq!(engine.phase(), Phase::Ready);
        assert!(engine.messages().is_empty());
    }

    #[tokio::test]
    async fn test_first_message_round_trip() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        assert_eq!(engine.phase(), Phase::Loading);

        engine.refresh().await;
        assert_eq!(engine.phase(), Phase::Ready);
        assert!(engine.messages().is_empty());

        engine.identity().set("alice");
        assert_eq!(engine.submit("hi").await, SubmitOutcome::Sent);
        assert_eq!(
            mock.submitted(),
            vec![NewMessage {
                username: "alice".to_string(),
                text: "hi".to_string(),
            }]
        );

        let view = engine.messages();
        assert_eq!(view, vec![message(1, "alice", "hi")]);
        assert!(engine.is_own(&view[0]));
    }

    #[tokio::test]
    async fn test_late_older_response_is_stale() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        let gate_a = mock.hold_next_fetch();
        let gate_b = mock.hold_next_fetch();

        let mut fetch_a = task::spawn(engine.refresh());
        let mut fetch_b = task::spawn(engine.refresh());
        assert_pending!(fetch_a.poll());
        assert_pending!(fetch_b.poll());

        let view_a = vec![message(1, "alice", "hi")];
        let view_b = vec![message(1, "alice", "hi"), message(2, "bob", "hey")];

        gate_b.send(Ok(view_b.clone())).unwrap();
        assert!(fetch_b.is_woken());
        assert_ready_eq!(fetch_b.poll(), RefreshOutcome::Applied);

        gate_a.send(Ok(view_a)).unwrap();
        assert!(fetch_a.is_woken());
        assert_ready_eq!(fetch_a.poll(), RefreshOutcome::Stale);

        assert_eq!(engine.messages(), view_b);
    }

    #[tokio::test]
    async fn test_in_order_responses_both_apply() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        let gate_a = mock.hold_next_fetch();
        let gate_b = mock.hold_next_fetch();

        let mut fetch_a = task::spawn(engine.refresh());
        let mut fetch_b = task::spawn(engine.refresh());
        assert_pending!(fetch_a.poll());
        assert_pending!(fetch_b.poll());

        gate_a.send(Ok(vec![message(1, "alice", "hi")])).unwrap();
        assert_ready_eq!(fetch_a.poll(), RefreshOutcome::Applied);

        let view_b = vec![message(1, "alice", "hi"), message(2, "bob", "hey")];
        gate_b.send(Ok(view_b.clone())).unwrap();
        assert_ready_eq!(fetch_b.poll(), RefreshOutcome::Applied);

        assert_eq!(engine.messages(), view_b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_cadence() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);

        engine.start();
        time::sleep(Duration::from_millis(4100)).await;

        // t=0, t=2000, t=4000
        assert_eq!(mock.fetch_calls(), 3);
        assert_eq!(engine.messages(), sample());

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_runs_one_loop() {
        let mock = MockTransport::new();
        let engine = engine(&mock);

        engine.start();
        engine.start();
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(mock.fetch_calls(), 1);
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_is_single_flight() {
        let mock = MockTransport::with_messages(sample());
        let settings = SyncSettings {
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
        };
        let engine = SyncEngine::new(mock.clone(), Identity::new(), settings);
        let gate = mock.hold_next_fetch();

        engine.start();
        time::sleep(Duration::from_secs(7)).await;
        assert_eq!(mock.fetch_calls(), 1);
        assert_eq!(engine.phase(), Phase::Loading);

        gate.send(Ok(vec![message(1, "alice", "hi")])).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(mock.fetch_calls(), 1);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(mock.fetch_calls(), 2);
        assert_eq!(engine.messages(), sample());

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_counts_as_failure() {
        let mock = MockTransport::new();
        let settings = SyncSettings {
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(1),
        };
        let engine = SyncEngine::new(mock.clone(), Identity::new(), settings);
        let _gate = mock.hold_next_fetch();

        assert_eq!(engine.refresh().await, RefreshOutcome::Failed);
        assert_eq!(engine.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);

        engine.start();
        time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(mock.fetch_calls(), 2);

        engine.stop().await;
        assert!(engine.is_stopped());
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.fetch_calls(), 2);

        engine.start();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_response_after_stop_is_discarded() {
        let mock = MockTransport::with_messages(sample());
        let engine = engine(&mock);
        engine.refresh().await;

        let gate = mock.hold_next_fetch();
        let mut pending = task::spawn(engine.refresh());
        assert_pending!(pending.poll());

        engine.stop().await;
        gate.send(Ok(vec![])).unwrap();
        assert_ready_eq!(pending.poll(), RefreshOutcome::Discarded);

        assert_eq!(engine.messages(), sample());
    }

    #[tokio::test]
    async fn test_submit_after_stop_is_dropped() {
        let mock = MockTransport::new();
        let engine = engine(&mock);
        engine.identity().set("alice");
        engine.stop().await;

        assert_eq!(engine.submit("hello").await, SubmitOutcome::Rejected);
        assert!(mock.submitted().is_empty());
    }
}
