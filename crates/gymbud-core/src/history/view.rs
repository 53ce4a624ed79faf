//! Live history views.
//!
//! A view reads the local store first and publishes the result on a watch
//! channel. Only then, and only when online, does it ask the remote for
//! updates in the background; a successful pull is followed by a fresh local
//! read. Reconnecting triggers another background pull. Dropping the view
//! aborts all of its background work.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::DEFAULT_PULL_TIMEOUT_SECS;
use crate::models::{HistoryListItem, RecordId, SessionDetail};
use crate::network::NetworkStatus;
use crate::services::LocalStore;
use crate::sync::RemoteSync;
use crate::tasks::{spawn_background, AbortOnDrop};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::Result;

use super::filter::{filter_history, HistoryFilter};
use super::selector::{load_history_list, load_session_detail};

/// What a view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Ready(T),
    /// The local read failed. Distinct from an empty result.
    Unavailable(String),
}

impl<T> ViewState<T> {
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Dependencies shared by the history views.
#[derive(Clone)]
pub struct HistoryContext {
    pub store: LocalStore,
    /// `None` keeps the views local-only.
    pub remote: Option<Arc<dyn RemoteSync>>,
    pub network: NetworkStatus,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub pull_timeout: Duration,
}

impl HistoryContext {
    pub fn new(
        store: LocalStore,
        network: NetworkStatus,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            remote: None,
            network,
            telemetry,
            pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteSync>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub const fn with_pull_timeout(mut self, pull_timeout: Duration) -> Self {
        self.pull_timeout = pull_timeout;
        self
    }
}

#[async_trait]
trait Projection: Send + Sync + 'static {
    /// What a read of the store produces.
    type Loaded: Send + Sync + 'static;
    /// What the view shows.
    type Output: Clone + Send + Sync + 'static;

    async fn load(&self, store: &LocalStore) -> Result<Self::Loaded>;

    fn present(&self, loaded: &Self::Loaded) -> Self::Output;
}

struct ListProjection {
    filter: Mutex<HistoryFilter>,
}

impl ListProjection {
    fn new(filter: HistoryFilter) -> Self {
        Self {
            filter: Mutex::new(filter),
        }
    }

    fn set_filter(&self, filter: HistoryFilter) {
        *lock(&self.filter) = filter;
    }
}

#[async_trait]
impl Projection for ListProjection {
    type Loaded = Vec<HistoryListItem>;
    type Output = Vec<HistoryListItem>;

    async fn load(&self, store: &LocalStore) -> Result<Self::Loaded> {
        load_history_list(store).await
    }

    fn present(&self, loaded: &Self::Loaded) -> Self::Output {
        let filter = lock(&self.filter);
        if filter.is_empty() {
            loaded.clone()
        } else {
            filter_history(loaded, &filter)
        }
    }
}

struct DetailProjection {
    session_id: RecordId,
}

#[async_trait]
impl Projection for DetailProjection {
    type Loaded = SessionDetail;
    type Output = SessionDetail;

    async fn load(&self, store: &LocalStore) -> Result<Self::Loaded> {
        load_session_detail(store, &self.session_id).await
    }

    fn present(&self, loaded: &Self::Loaded) -> Self::Output {
        loaded.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Published state plus the last successful read it was derived from.
struct Slot<P: Projection> {
    state: watch::Sender<ViewState<P::Output>>,
    loaded: Mutex<Option<P::Loaded>>,
}

impl<P: Projection> Slot<P> {
    fn new() -> Self {
        let (state, _) = watch::channel(ViewState::Idle);
        Self {
            state,
            loaded: Mutex::new(None),
        }
    }

    fn loading(&self) {
        lock(&self.loaded).take();
        self.state.send_replace(ViewState::Loading);
    }

    fn fail(&self, message: String) {
        lock(&self.loaded).take();
        self.state.send_replace(ViewState::Unavailable(message));
    }

    fn publish(&self, projection: &P, loaded: P::Loaded) {
        self.state.send_modify(|state| {
            *state = ViewState::Ready(projection.present(&loaded));
            *lock(&self.loaded) = Some(loaded);
        });
    }

    /// Present the last read again; no-op unless one succeeded.
    fn republish(&self, projection: &P) {
        self.state.send_if_modified(|state| {
            let loaded = lock(&self.loaded);
            let Some(loaded) = loaded.as_ref() else {
                return false;
            };
            *state = ViewState::Ready(projection.present(loaded));
            true
        });
    }
}

/// Local-first load plus background refresh, shared by both views.
struct ViewCore<P: Projection> {
    ctx: HistoryContext,
    slot: Arc<Slot<P>>,
    projection: Option<Arc<P>>,
    refresh: Option<AbortOnDrop>,
    watcher: Option<AbortOnDrop>,
}

impl<P: Projection> ViewCore<P> {
    fn new(ctx: HistoryContext) -> Self {
        Self {
            ctx,
            slot: Arc::new(Slot::new()),
            projection: None,
            refresh: None,
            watcher: None,
        }
    }

    fn subscribe(&self) -> watch::Receiver<ViewState<P::Output>> {
        self.slot.state.subscribe()
    }

    fn current(&self) -> ViewState<P::Output> {
        self.slot.state.borrow().clone()
    }

    async fn load(&mut self, projection: P) {
        // Work started for a previous projection must not publish over this one.
        self.refresh = None;
        self.watcher = None;

        let projection = Arc::new(projection);
        self.projection = Some(projection.clone());
        self.slot.loading();
        match projection.load(&self.ctx.store).await {
            Ok(loaded) => self.slot.publish(&projection, loaded),
            Err(error) => {
                tracing::warn!("History read failed: {error}");
                self.slot.fail(error.to_string());
            }
        }

        let Some(remote) = self.ctx.remote.clone() else {
            return;
        };

        if self.ctx.network.is_online() {
            self.refresh = Some(AbortOnDrop::new(pull_and_reload(
                &self.ctx,
                remote.clone(),
                projection.clone(),
                self.slot.clone(),
            )));
        }

        let mut network = self.ctx.network.subscribe();
        let ctx = self.ctx.clone();
        let slot = self.slot.clone();
        self.watcher = Some(AbortOnDrop::new(tokio::spawn(async move {
            while network.came_online().await {
                tracing::debug!("Back online, pulling history updates");
                AbortOnDrop::new(pull_and_reload(
                    &ctx,
                    remote.clone(),
                    projection.clone(),
                    slot.clone(),
                ))
                .finished()
                .await;
            }
        })));
    }

    fn republish(&self) {
        if let Some(projection) = &self.projection {
            self.slot.republish(projection);
        }
    }

    async fn settle(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.finished().await;
        }
    }
}

fn pull_and_reload<P: Projection>(
    ctx: &HistoryContext,
    remote: Arc<dyn RemoteSync>,
    projection: Arc<P>,
    slot: Arc<Slot<P>>,
) -> JoinHandle<()> {
    let store = ctx.store.clone();
    spawn_background("history pull", ctx.pull_timeout, async move {
        remote.pull_updates().await?;
        let loaded = projection.load(&store).await?;
        slot.publish(&projection, loaded);
        Ok(())
    })
}

/// The session history list.
pub struct HistoryListView {
    core: ViewCore<ListProjection>,
    filter: HistoryFilter,
}

impl HistoryListView {
    /// Mount the list. Returns once the local result is published.
    pub async fn mount(ctx: HistoryContext, filter: HistoryFilter) -> Self {
        ctx.telemetry.record(TelemetryEvent::HistoryListViewed);

        let mut core = ViewCore::new(ctx);
        core.load(ListProjection::new(filter.clone())).await;
        Self { core, filter }
    }

    pub const fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    /// Re-filter the items already read. Does not touch the store.
    pub fn set_filter(&mut self, filter: HistoryFilter) {
        if let Some(projection) = &self.core.projection {
            projection.set_filter(filter.clone());
        }
        self.filter = filter;
        self.core.republish();
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<Vec<HistoryListItem>>> {
        self.core.subscribe()
    }

    pub fn state(&self) -> ViewState<Vec<HistoryListItem>> {
        self.core.current()
    }

    /// Wait for the refresh started at mount, if any, to finish or fail.
    pub async fn settle(&mut self) {
        self.core.settle().await;
    }
}

/// Detail of one session at a time.
pub struct HistoryDetailView {
    core: ViewCore<DetailProjection>,
    session_id: Option<RecordId>,
}

impl HistoryDetailView {
    pub fn new(ctx: HistoryContext) -> Self {
        Self {
            core: ViewCore::new(ctx),
            session_id: None,
        }
    }

    /// Show `session_id`, replacing whatever was shown before. Returns once
    /// the local result is published.
    pub async fn show(&mut self, session_id: RecordId) {
        if self.session_id.as_ref() != Some(&session_id) {
            self.core
                .ctx
                .telemetry
                .record(TelemetryEvent::HistoryDetailViewed {
                    session_id: session_id.clone(),
                });
            self.session_id = Some(session_id.clone());
        }

        self.core.load(DetailProjection { session_id }).await;
    }

    pub const fn session_id(&self) -> Option<&RecordId> {
        self.session_id.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<SessionDetail>> {
        self.core.subscribe()
    }

    pub fn state(&self) -> ViewState<SessionDetail> {
        self.core.current()
    }

    /// Wait for the refresh started by the last `show`, if any.
    pub async fn settle(&mut self) {
        self.core.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Session, SessionStatus};
    use crate::network::NetworkMonitor;
    use crate::remote::RemoteError;
    use crate::sync::MergeReport;
    use crate::telemetry::TelemetryBuffer;
    use crate::Error;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    struct FakeRemote {
        store: LocalStore,
        incoming: Option<Session>,
        fail: bool,
        delay: Duration,
        pulls: AtomicUsize,
        completed: AtomicBool,
    }

    impl FakeRemote {
        fn new(store: &LocalStore) -> Self {
            Self {
                store: store.clone(),
                incoming: None,
                fail: false,
                delay: Duration::ZERO,
                pulls: AtomicUsize::new(0),
                completed: AtomicBool::new(false),
            }
        }

        fn pulls(&self) -> usize {
            self.pulls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteSync for FakeRemote {
        async fn pull_updates(&self) -> Result<MergeReport> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::Remote(RemoteError::Api {
                    code: None,
                    message: "unreachable".to_string(),
                }));
            }

            let mut report = MergeReport::default();
            if let Some(session) = &self.incoming {
                self.store.put_session(session).await?;
                report.applied = 1;
            }
            self.completed.store(true, Ordering::SeqCst);
            Ok(report)
        }
    }

    fn session(id: &str, date: &str) -> Session {
        Session {
            id: RecordId::from(id),
            date: date.parse().unwrap(),
            status: SessionStatus::Completed,
            is_baseline: false,
            updated_at: 1,
            synced_at: Some(1),
        }
    }

    fn ids(state: &ViewState<Vec<HistoryListItem>>) -> Vec<String> {
        state
            .ready()
            .map(|items| items.iter().map(|item| item.session_id.to_string()).collect())
            .unwrap_or_default()
    }

    async fn setup() -> (LocalStore, Arc<TelemetryBuffer>) {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.put_session(&session("local", "2024-01-02")).await.unwrap();
        (store, Arc::new(TelemetryBuffer::default()))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_publishes_local_then_rereads_after_pull() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.incoming = Some(session("pulled", "2024-01-05"));
        remote.delay = Duration::from_millis(50);
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store, NetworkStatus::fixed(true), telemetry.clone())
            .with_remote(remote.clone());
        let view = HistoryListView::mount(ctx, HistoryFilter::default()).await;

        assert_eq!(ids(&view.state()), vec!["local"]);

        let mut rx = view.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|state| ids(state).len() == 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&view.state()), vec!["pulled", "local"]);
        assert_eq!(remote.pulls(), 1);
        assert_eq!(telemetry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_mount_waits_for_reconnect() {
        let (store, telemetry) = setup().await;
        let remote = Arc::new(FakeRemote::new(&store));
        let (monitor, network) = NetworkMonitor::new(false);

        let ctx = HistoryContext::new(store, network, telemetry).with_remote(remote.clone());
        let view = HistoryListView::mount(ctx, HistoryFilter::default()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(remote.pulls(), 0);
        assert_eq!(ids(&view.state()), vec!["local"]);

        monitor.set_online(true);
        tokio::time::timeout(WAIT, async {
            while remote.pulls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(remote.pulls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_pull_keeps_local_result() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.fail = true;
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store, NetworkStatus::fixed(true), telemetry)
            .with_remote(remote.clone());
        let mut view = HistoryListView::mount(ctx, HistoryFilter::default()).await;

        tokio::time::timeout(WAIT, view.settle()).await.unwrap();
        assert_eq!(remote.pulls(), 1);
        assert_eq!(ids(&view.state()), vec!["local"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_view_aborts_pull() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.delay = Duration::from_millis(150);
        remote.incoming = Some(session("late", "2024-01-09"));
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store.clone(), NetworkStatus::fixed(true), telemetry)
            .with_remote(remote.clone());
        let view = HistoryListView::mount(ctx, HistoryFilter::default()).await;
        let rx = view.subscribe();
        drop(view);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!remote.completed.load(Ordering::SeqCst));
        assert_eq!(ids(&rx.borrow()), vec!["local"]);
        assert!(store
            .get_session(&RecordId::from("late"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_pull_times_out_without_publishing() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.delay = Duration::from_millis(300);
        remote.incoming = Some(session("slow", "2024-01-09"));
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store, NetworkStatus::fixed(true), telemetry)
            .with_remote(remote.clone())
            .with_pull_timeout(Duration::from_millis(30));
        let view = HistoryListView::mount(ctx, HistoryFilter::default()).await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!remote.completed.load(Ordering::SeqCst));
        assert_eq!(ids(&view.state()), vec!["local"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detail_settle_waits_for_refresh() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.delay = Duration::from_millis(30);
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store, NetworkStatus::fixed(true), telemetry)
            .with_remote(remote.clone());
        let mut view = HistoryDetailView::new(ctx);
        view.show(RecordId::from("local")).await;
        view.settle().await;

        assert!(remote.completed.load(Ordering::SeqCst));
        let state = view.state();
        assert_eq!(
            state.ready().and_then(|detail| detail.session.as_ref()).map(|s| s.id.as_str()),
            Some("local")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_applies_filter() {
        let (store, telemetry) = setup().await;
        store.put_session(&session("later", "2024-01-08")).await.unwrap();

        let filter = HistoryFilter::parse(None, Some("2024-01-05"), None, None).unwrap();
        let ctx = HistoryContext::new(store, NetworkStatus::fixed(false), telemetry);
        let view = HistoryListView::mount(ctx, filter).await;

        assert_eq!(ids(&view.state()), vec!["later"]);
        assert!(view.filter().from.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn changing_filter_refilters_loaded_items_only() {
        let (store, telemetry) = setup().await;
        store.put_session(&session("later", "2024-01-08")).await.unwrap();

        let ctx = HistoryContext::new(
            store.clone(),
            NetworkStatus::fixed(false),
            telemetry.clone(),
        );
        let mut view = HistoryListView::mount(ctx, HistoryFilter::default()).await;
        assert_eq!(ids(&view.state()), vec!["later", "local"]);

        store.put_session(&session("unread", "2024-01-09")).await.unwrap();

        view.set_filter(HistoryFilter::parse(None, None, None, Some("01-02")).unwrap());
        assert_eq!(ids(&view.state()), vec!["local"]);
        assert_eq!(view.filter().query, "01-02");

        view.set_filter(HistoryFilter::default());
        assert_eq!(ids(&view.state()), vec!["later", "local"]);
        assert_eq!(telemetry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refilter_after_pull_uses_reread_items() {
        let (store, telemetry) = setup().await;
        let mut remote = FakeRemote::new(&store);
        remote.incoming = Some(session("pulled", "2024-01-05"));
        let remote = Arc::new(remote);

        let ctx = HistoryContext::new(store, NetworkStatus::fixed(true), telemetry.clone())
            .with_remote(remote);
        let mut view = HistoryListView::mount(ctx, HistoryFilter::default()).await;
        view.settle().await;

        view.set_filter(HistoryFilter::parse(None, Some("2024-01-04"), None, None).unwrap());
        assert_eq!(ids(&view.state()), vec!["pulled"]);
        assert_eq!(telemetry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detail_records_telemetry_once_per_session() {
        let (store, telemetry) = setup().await;
        let ctx = HistoryContext::new(store, NetworkStatus::fixed(false), telemetry.clone());
        let mut view = HistoryDetailView::new(ctx);

        assert_eq!(view.state(), ViewState::Idle);
        view.show(RecordId::from("local")).await;
        view.show(RecordId::from("local")).await;
        view.show(RecordId::from("missing")).await;

        let events: Vec<TelemetryEvent> = telemetry.flush().into_iter().map(|r| r.event).collect();
        assert_eq!(
            events,
            vec![
                TelemetryEvent::HistoryDetailViewed {
                    session_id: RecordId::from("local")
                },
                TelemetryEvent::HistoryDetailViewed {
                    session_id: RecordId::from("missing")
                },
            ]
        );

        let state = view.state();
        let detail = state.ready().unwrap();
        assert!(detail.session.is_none());
        assert_eq!(view.session_id().map(RecordId::as_str), Some("missing"));
    }

    struct Broken;

    #[async_trait]
    impl Projection for Broken {
        type Loaded = ();
        type Output = ();

        async fn load(&self, _store: &LocalStore) -> Result<()> {
            Err(Error::Database("disk I/O error".to_string()))
        }

        fn present(&self, _loaded: &()) {}
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_local_read_is_unavailable() {
        let (store, telemetry) = setup().await;
        let ctx = HistoryContext::new(store, NetworkStatus::fixed(false), telemetry);
        let mut core = ViewCore::<Broken>::new(ctx);

        core.load(Broken).await;
        assert_eq!(
            core.current(),
            ViewState::Unavailable("Database error: disk I/O error".to_string())
        );

        core.republish();
        assert_eq!(
            core.current(),
            ViewState::Unavailable("Database error: disk I/O error".to_string())
        );
    }
}
