//! Event dispatcher: fans one backend event slot out to many subscribers.
//!
//! A [`ChatApi`](banter_core::ChatApi) holds at most one callback per [`EventKind`]. The
//! [`EventDispatcher`] installs a single *multiplexer* into that slot the
//! first time someone subscribes to a kind, and removes it again once the kind
//! has no live subscribers left, so the backend's unhandled-event path is
//! restored.
//!
//! # Ordering
//!
//! Subscribers run in ascending priority ("nice") and, within the same
//! priority, in registration order. The bands in [`priority`] are the
//! conventional values:
//!
//! ```text
//! PRE_PRE (-2000) ─► PRE (-1000) ─► NORMAL (0) ─► POST (1000) ─► POST_POST (2000)
//! ```
//!
//! A subscriber returning [`Flow::Handled`] stops the dispatch.
//!
//! # Reentrancy
//!
//! Each dispatch walks an immutable snapshot of the subscriber list:
//!
//! - subscribers registered while a dispatch is running are parked in a
//!   pending list and become visible on the next event;
//! - unregistering sets a tombstone bit; dispatches that start afterwards
//!   skip the subscriber, one already running still reaches it;
//! - the list is compacted (tombstones dropped, pending merged) once the
//!   outermost dispatch of that kind finishes.
//!
//! # Example
//!
//! ```rust,ignore
//! let dispatcher = EventDispatcher::new(api);
//! let handle = dispatcher.register(EventKind::Message, |event| async move {
//!     if let Some(msg) = event.message() {
//!         msg.reply("pong").await?;
//!     }
//!     Ok(Flow::Continue)
//! }, priority::NORMAL);
//!
//! dispatcher.unregister(&handle);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use banter_core::{BoxError, BoxedApi, Event, EventCallback, EventKind};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

/// Conventional priority bands. Lower values run first.
pub mod priority {
    pub const PRE_PRE: i32 = -2000;
    pub const PRE: i32 = -1000;
    pub const NORMAL: i32 = 0;
    pub const POST: i32 = 1000;
    pub const POST_POST: i32 = 2000;
}

/// What a subscriber wants the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Call the next subscriber.
    #[default]
    Continue,
    /// Stop; no further subscriber sees this event.
    Handled,
}

type SubscriberFn = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<Flow, BoxError>> + Send + Sync>;

/// Decides what happens when a subscriber fails.
///
/// Returning `true` marks the error as caught and the dispatch continues;
/// `false` stops the dispatch and hands the error back to the backend.
pub type ExceptionSink = Arc<dyn Fn(EventKind, &BoxError) -> bool + Send + Sync>;

struct Subscriber {
    nice: i32,
    seq: u64,
    callback: SubscriberFn,
    dead: AtomicBool,
}

impl Subscriber {
    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }
}

/// Subscribers of one kind.
///
/// The entry exists exactly while the multiplexer for that kind is installed
/// in the backend.
struct KindList {
    live: Vec<Arc<Subscriber>>,
    pending: Vec<Arc<Subscriber>>,
    depth: usize,
}

impl KindList {
    fn new() -> Self {
        Self {
            live: Vec::new(),
            pending: Vec::new(),
            depth: 0,
        }
    }

    fn insert(&mut self, sub: Arc<Subscriber>) {
        let pos = self
            .live
            .partition_point(|s| (s.nice, s.seq) <= (sub.nice, sub.seq));
        self.live.insert(pos, sub);
    }

    fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.live.iter().filter(|s| !s.is_dead()).cloned().collect()
    }

    /// Drops tombstones and merges pending registrations.
    fn compact(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.live.extend(pending);
        self.live.retain(|s| !s.is_dead());
        self.live.sort_by_key(|s| (s.nice, s.seq));
    }

    fn is_empty(&self) -> bool {
        self.live.is_empty() && self.pending.iter().all(|s| s.is_dead())
    }
}

struct Inner {
    api: BoxedApi,
    kinds: Mutex<HashMap<EventKind, KindList>>,
    sink: RwLock<Option<ExceptionSink>>,
    next_seq: AtomicU64,
}

impl Inner {
    /// Compacts `kind` if no dispatch of it is running, uninstalling the
    /// multiplexer when nothing is left.
    fn settle(&self, kinds: &mut HashMap<EventKind, KindList>, kind: EventKind) {
        let Some(list) = kinds.get_mut(&kind) else {
            return;
        };
        if list.depth > 0 {
            return;
        }
        list.compact();
        if list.is_empty() {
            kinds.remove(&kind);
            self.api.register_event_handler(kind, None);
            debug!(kind = %kind, "Last subscriber gone, multiplexer removed");
        }
    }

    fn catches(&self, kind: EventKind, err: &BoxError) -> bool {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink(kind, err),
            None => false,
        }
    }

    async fn dispatch(&self, event: Event) -> Result<(), BoxError> {
        let kind = event.kind();
        let snapshot = {
            let mut kinds = self.kinds.lock();
            match kinds.get_mut(&kind) {
                Some(list) => {
                    list.depth += 1;
                    list.snapshot()
                }
                None => return Ok(()),
            }
        };
        let guard = DepthGuard { inner: self, kind };
        trace!(kind = %kind, subscribers = snapshot.len(), "Dispatching event");

        let mut raised = None;
        for sub in &snapshot {
            match (sub.callback)(event.clone()).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Handled) => {
                    trace!(kind = %kind, nice = sub.nice, "Event handled, stopping dispatch");
                    break;
                }
                Err(err) => {
                    if self.catches(kind, &err) {
                        continue;
                    }
                    raised = Some(err);
                    break;
                }
            }
        }

        drop(guard);
        match raised {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Leaves a dispatch level, compacting on the way out. Also runs when the
/// dispatch future is dropped mid-way.
struct DepthGuard<'a> {
    inner: &'a Inner,
    kind: EventKind,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let mut kinds = self.inner.kinds.lock();
        if let Some(list) = kinds.get_mut(&self.kind) {
            list.depth = list.depth.saturating_sub(1);
        }
        self.inner.settle(&mut kinds, self.kind);
    }
}

/// Handle returned by [`EventDispatcher::register`].
#[derive(Clone)]
pub struct EventHandle {
    kind: EventKind,
    sub: Arc<Subscriber>,
}

impl EventHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn priority(&self) -> i32 {
        self.sub.nice
    }

    /// `false` once the subscriber was unregistered (or the dispatcher
    /// cleared).
    pub fn is_active(&self) -> bool {
        !self.sub.is_dead()
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("kind", &self.kind)
            .field("priority", &self.sub.nice)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Multiplexes backend event slots into priority-ordered subscriber lists.
///
/// Cloning is cheap; clones share the same subscriber lists.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    /// Creates a dispatcher over `api`. Nothing is installed into the backend
    /// until the first [`register`](Self::register).
    pub fn new(api: BoxedApi) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                kinds: Mutex::new(HashMap::new()),
                sink: RwLock::new(None),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// The backend this dispatcher is attached to.
    pub fn api(&self) -> &BoxedApi {
        &self.inner.api
    }

    /// Sets (or clears) the exception sink.
    pub fn set_exception_sink(&self, sink: Option<ExceptionSink>) {
        *self.inner.sink.write() = sink;
    }

    /// Subscribes `callback` to `kind` at priority `nice`.
    pub fn register<F, Fut>(&self, kind: EventKind, callback: F, nice: i32) -> EventHandle
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        let callback: SubscriberFn = Arc::new(move |event| Box::pin(callback(event)));
        let sub = Arc::new(Subscriber {
            nice,
            seq: self.inner.next_seq.fetch_add(1, Ordering::SeqCst),
            callback,
            dead: AtomicBool::new(false),
        });

        let mut kinds = self.inner.kinds.lock();
        let list = kinds.entry(kind).or_insert_with(|| {
            self.inner
                .api
                .register_event_handler(kind, Some(self.multiplexer()));
            debug!(kind = %kind, "Multiplexer installed");
            KindList::new()
        });
        if list.depth > 0 {
            list.pending.push(Arc::clone(&sub));
        } else {
            list.insert(Arc::clone(&sub));
        }
        trace!(kind = %kind, nice, "Subscriber registered");

        EventHandle { kind, sub }
    }

    /// Unsubscribes; calling it again is a no-op.
    pub fn unregister(&self, handle: &EventHandle) {
        if handle.sub.dead.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut kinds = self.inner.kinds.lock();
        self.inner.settle(&mut kinds, handle.kind);
    }

    /// Removes every multiplexer from the backend and drops all subscribers.
    pub fn clear(&self) {
        let mut kinds = self.inner.kinds.lock();
        for (kind, list) in kinds.drain() {
            for sub in list.live.iter().chain(list.pending.iter()) {
                sub.dead.store(true, Ordering::SeqCst);
            }
            self.inner.api.register_event_handler(kind, None);
        }
        debug!("Dispatcher cleared");
    }

    /// Number of live (non-tombstoned) subscribers of `kind`, pending ones
    /// included.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.kinds.lock().get(&kind).map_or(0, |list| {
            list.live
                .iter()
                .chain(list.pending.iter())
                .filter(|s| !s.is_dead())
                .count()
        })
    }

    /// Runs `event` through the subscribers directly, bypassing the backend.
    pub async fn dispatch(&self, event: Event) -> Result<(), BoxError> {
        self.inner.dispatch(event).await
    }

    fn multiplexer(&self) -> EventCallback {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |event| {
            let inner = inner.upgrade();
            Box::pin(async move {
                match inner {
                    Some(inner) => inner.dispatch(event).await,
                    None => Ok(()),
                }
            })
        })
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<EventKind> = self.inner.kinds.lock().keys().copied().collect();
        f.debug_struct("EventDispatcher")
            .field("api", &self.inner.api.api_id())
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_adapter_stub::{Outcome, StubApi, StubOptions};
    use banter_core::{ChatApi, ChatType};
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (Arc<StubApi>, EventDispatcher) {
        let api = StubApi::new(StubOptions::default());
        let dispatcher = EventDispatcher::new(api.clone());
        (api, dispatcher)
    }

    fn recorder(
        dispatcher: &EventDispatcher,
        log: &Arc<Mutex<Vec<i32>>>,
        nice: i32,
    ) -> EventHandle {
        let log = Arc::clone(log);
        dispatcher.register(
            EventKind::Ready,
            move |_| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(nice);
                    Ok(Flow::Continue)
                }
            },
            nice,
        )
    }

    #[tokio::test]
    async fn test_priority_order() {
        let (api, dispatcher) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        for nice in [
            priority::NORMAL,
            priority::POST_POST,
            priority::POST,
            priority::PRE,
            priority::PRE_PRE,
        ] {
            recorder(&dispatcher, &log, nice);
        }

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                priority::PRE_PRE,
                priority::PRE,
                priority::NORMAL,
                priority::POST,
                priority::POST_POST
            ]
        );
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_registration_order() {
        let (api, dispatcher) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let log = Arc::clone(&log);
            dispatcher.register(
                EventKind::Ready,
                move |_| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().push(tag);
                        Ok(Flow::Continue)
                    }
                },
                priority::NORMAL,
            );
        }

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_handled_stops_dispatch() {
        let (api, dispatcher) = setup();
        let later = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            EventKind::Ready,
            |_| async { Ok(Flow::Handled) },
            priority::PRE,
        );
        let counter = Arc::clone(&later);
        dispatcher.register(
            EventKind::Ready,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Flow::Continue) }
            },
            priority::POST,
        );

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unregister_during_dispatch_uses_snapshot() {
        let (api, dispatcher) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<EventHandle>>> = Arc::new(Mutex::new(None));

        {
            let log = Arc::clone(&log);
            let victim = Arc::clone(&victim);
            let dispatcher2 = dispatcher.clone();
            dispatcher.register(
                EventKind::Ready,
                move |_| {
                    log.lock().push(priority::NORMAL);
                    if let Some(handle) = victim.lock().take() {
                        dispatcher2.unregister(&handle);
                    }
                    async { Ok(Flow::Continue) }
                },
                priority::NORMAL,
            );
        }
        let post = recorder(&dispatcher, &log, priority::POST);
        *victim.lock() = Some(post.clone());

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(*log.lock(), vec![priority::NORMAL, priority::POST]);
        assert!(!post.is_active());

        log.lock().clear();
        api.inject(Event::Ready).await.unwrap();
        assert_eq!(*log.lock(), vec![priority::NORMAL]);
        assert_eq!(dispatcher.subscriber_count(EventKind::Ready), 1);
    }

    #[tokio::test]
    async fn test_register_during_dispatch_is_deferred() {
        let (api, dispatcher) = setup();
        let late_calls = Arc::new(AtomicUsize::new(0));
        let registered = Arc::new(AtomicBool::new(false));

        {
            let dispatcher2 = dispatcher.clone();
            let late_calls = Arc::clone(&late_calls);
            let registered = Arc::clone(&registered);
            dispatcher.register(
                EventKind::Ready,
                move |_| {
                    if !registered.swap(true, Ordering::SeqCst) {
                        let late_calls = Arc::clone(&late_calls);
                        dispatcher2.register(
                            EventKind::Ready,
                            move |_| {
                                late_calls.fetch_add(1, Ordering::SeqCst);
                                async { Ok(Flow::Continue) }
                            },
                            priority::POST_POST,
                        );
                    }
                    async { Ok(Flow::Continue) }
                },
                priority::NORMAL,
            );
        }

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multiplexer_installed_and_removed() {
        let (api, dispatcher) = setup();
        assert!(!api.event_slots().is_set(EventKind::Message));

        let a = dispatcher.register(
            EventKind::Message,
            |_| async { Ok(Flow::Continue) },
            priority::NORMAL,
        );
        let b = dispatcher.register(
            EventKind::Message,
            |_| async { Ok(Flow::Continue) },
            priority::POST,
        );
        assert!(api.event_slots().is_set(EventKind::Message));

        dispatcher.unregister(&a);
        dispatcher.unregister(&a);
        assert!(api.event_slots().is_set(EventKind::Message));
        dispatcher.unregister(&b);
        assert!(!api.event_slots().is_set(EventKind::Message));
    }

    #[tokio::test]
    async fn test_error_reraised_without_sink() {
        let (api, dispatcher) = setup();
        let after = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            EventKind::Ready,
            |_| async { Err::<Flow, BoxError>("boom".into()) },
            priority::NORMAL,
        );
        let counter = Arc::clone(&after);
        dispatcher.register(
            EventKind::Ready,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Flow::Continue) }
            },
            priority::POST,
        );

        let err = api.inject(Event::Ready).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sink_catches_and_continues() {
        let (api, dispatcher) = setup();
        let caught = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));

        let sink_counter = Arc::clone(&caught);
        dispatcher.set_exception_sink(Some(Arc::new(move |kind: EventKind, _err: &BoxError| {
            assert_eq!(kind, EventKind::Ready);
            sink_counter.fetch_add(1, Ordering::SeqCst);
            true
        })));
        dispatcher.register(
            EventKind::Ready,
            |_| async { Err::<Flow, BoxError>("boom".into()) },
            priority::NORMAL,
        );
        let counter = Arc::clone(&after);
        dispatcher.register(
            EventKind::Ready,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Flow::Continue) }
            },
            priority::POST,
        );

        api.inject(Event::Ready).await.unwrap();
        assert_eq!(caught.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_uninstalls_everything() {
        let (api, dispatcher) = setup();
        let handle = dispatcher.register(
            EventKind::Message,
            |_| async { Ok(Flow::Continue) },
            priority::NORMAL,
        );
        dispatcher.register(
            EventKind::FriendRequest,
            |_| async { Ok(Flow::Continue) },
            priority::NORMAL,
        );

        dispatcher.clear();
        assert!(!handle.is_active());
        assert!(!api.event_slots().is_set(EventKind::Message));
        assert!(!api.event_slots().is_set(EventKind::FriendRequest));
    }

    #[tokio::test]
    async fn test_message_reaches_subscriber() {
        let (api, dispatcher) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.register(
            EventKind::Message,
            move |event| {
                if let Some(msg) = event.message() {
                    sink.lock().push(msg.text().to_string());
                }
                async { Ok(Flow::Continue) }
            },
            priority::NORMAL,
        );

        let alice = api.add_user("alice", "Alice");
        let chat = api.add_chat("dm", ChatType::Normal, 1);
        api.inject_message(&alice, &chat, "hello").await.unwrap();
        assert_eq!(*seen.lock(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_group_and_file_events_reach_subscribers() {
        let (api, dispatcher) = setup();
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        for kind in [
            EventKind::GroupInvite,
            EventKind::GroupMemberJoin,
            EventKind::GroupMemberLeave,
            EventKind::FiletransferReceived,
        ] {
            let log = Arc::clone(&log);
            dispatcher.register(
                kind,
                move |event| {
                    let log = Arc::clone(&log);
                    async move {
                        let line = match &event {
                            Event::GroupInvite(req) => {
                                req.decline().await?;
                                format!("invite {} {}", req.author().id(), req.text())
                            }
                            Event::GroupMemberJoin { chat, user } => {
                                format!("join {} {} {}", chat.id(), user.id(), chat.size())
                            }
                            Event::GroupMemberLeave { chat, user } => {
                                format!("leave {} {} {}", chat.id(), user.id(), chat.size())
                            }
                            Event::FiletransferReceived(file) => {
                                file.accept(std::path::Path::new("downloads")).await?;
                                format!(
                                    "file {} {} {} {}",
                                    file.author().id(),
                                    file.chat().id(),
                                    file.file_name(),
                                    file.file_size()
                                )
                            }
                            other => format!("unexpected {:?}", other.kind()),
                        };
                        log.lock().push(line);
                        Ok(Flow::Continue)
                    }
                },
                priority::NORMAL,
            );
        }

        let alice = api.add_user("alice", "Alice");
        let group = api.add_chat("g", ChatType::Group, 1);
        assert_eq!(group.size(), 2);

        let invite = api.inject_group_invite(&alice, "join us").await.unwrap();
        api.inject_member_join(&group, &alice).await.unwrap();
        api.inject_member_leave(&group, &alice).await.unwrap();
        let file = api.inject_file(&alice, &group, "notes.txt", 42).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "invite alice join us",
                "join g alice 3",
                "leave g alice 2",
                "file alice g notes.txt 42",
            ]
        );
        assert_eq!(group.size(), 2);
        assert_eq!(invite.outcome(), Some(Outcome::Declined));
        assert_eq!(
            file.outcome(),
            Some(Outcome::Stored(std::path::PathBuf::from("downloads")))
        );
    }
}
