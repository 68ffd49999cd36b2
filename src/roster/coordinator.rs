//! Live Roster
//!
//! Wires the live connection and the page fetcher into one collection.
//! Push events are drained by a single consumer task in delivery order;
//! page loads run on the caller's task. Both mutate the collection only
//! through the handle, so they interleave but never overlap.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::arrivals::{Arrival, ArrivalQueue};
use crate::client::{Fetch, FetchError, FetchResult, PersonsApi};
use crate::collection::{CollectionHandle, RosterSnapshot};
use crate::config::Config;
use crate::model::{Person, PersonId, PersonUpdate};
use crate::pager::{LoadOutcome, PageFetcher};
use crate::realtime::{
    decode, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats, LiveEvent,
};

/// A mounted, live-updating roster
pub struct LiveRoster {
    collection: CollectionHandle,
    pager: PageFetcher,
    connection: ConnectionManager,
    persons: PersonsApi,
    arrivals: Arc<Mutex<ArrivalQueue>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl LiveRoster {
    /// Mount a roster: open the live connection and load the first page
    ///
    /// A failed first page does not fail the mount; it is kept as the
    /// pager's last error and `refresh` can retry it.
    pub async fn mount(config: &Config, fetch: Arc<dyn Fetch>) -> Self {
        let collection = CollectionHandle::new();
        let pager = PageFetcher::new(
            Arc::clone(&fetch),
            collection.clone(),
            config.pagination.effective_page_size(),
        );
        let (connection, events) =
            ConnectionManager::new(config.realtime_endpoint(), &config.realtime);
        let arrivals = Arc::new(Mutex::new(ArrivalQueue::new()));

        let consumer = tokio::spawn(consume_events(
            events,
            collection.clone(),
            Arc::clone(&arrivals),
        ));

        let roster = Self {
            collection,
            pager,
            connection,
            persons: PersonsApi::new(fetch),
            arrivals,
            consumer: Mutex::new(Some(consumer)),
            torn_down: AtomicBool::new(false),
        };

        tracing::info!(url = %roster.connection.url(), "Mounting live roster");
        roster.connection.connect();

        if let Err(e) = roster.pager.load_first().await {
            tracing::warn!(error = %e, "Initial page load failed");
        }

        roster
    }

    /// Reload from the first page
    pub async fn refresh(&self) -> FetchResult<LoadOutcome> {
        if self.is_torn_down() {
            return Ok(LoadOutcome::Discarded);
        }
        self.pager.load_first().await
    }

    /// Load the next page, if any
    pub async fn load_more(&self) -> FetchResult<LoadOutcome> {
        if self.is_torn_down() {
            return Ok(LoadOutcome::Discarded);
        }
        self.pager.load_next().await
    }

    /// Update a person on the server and reflect the result in place
    pub async fn update_person(&self, id: PersonId, update: &PersonUpdate) -> FetchResult<Person> {
        if self.is_torn_down() {
            return Err(FetchError::InvalidRequest("roster is torn down".to_string()));
        }
        let person = self.persons.update_person(id, update).await?;
        self.collection.update_in_place(person.clone()).await;
        Ok(person)
    }

    /// The host application became active again (tab visible, window focused)
    pub fn host_became_active(&self) {
        if !self.is_torn_down() {
            self.connection.check_alive();
        }
    }

    /// Force a fresh live session
    pub async fn reconnect(&self) {
        if !self.is_torn_down() {
            self.connection.reconnect().await;
        }
    }

    /// Unmount: close the connection, discard the collection, stop consuming
    ///
    /// Page loads still in flight complete as `Discarded` and leave no trace.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pager.close();
        self.connection.shutdown();
        self.collection.detach().await;
        if let Some(consumer) = self.consumer.lock().take() {
            consumer.abort();
        }
        self.arrivals.lock().close();

        tracing::info!("Live roster torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> Arc<RosterSnapshot> {
        self.collection.snapshot()
    }

    /// Receive every committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<RosterSnapshot>> {
        self.collection.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.connection.stats()
    }

    pub fn has_next_page(&self) -> bool {
        self.pager.has_next_page()
    }

    pub fn is_loading(&self) -> bool {
        self.pager.is_loading()
    }

    pub fn last_page_error(&self) -> Option<FetchError> {
        self.pager.last_error()
    }

    /// Arrival notice currently showing
    pub fn current_arrival(&self) -> Option<Arrival> {
        self.arrivals.lock().current().cloned()
    }

    /// Dismiss the current arrival; returns the next one shown, if any
    pub fn dismiss_arrival(&self) -> Option<Arrival> {
        self.arrivals.lock().close_current().cloned()
    }

    pub fn clear_arrivals(&self) {
        self.arrivals.lock().clear();
    }

    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.lock().pending()
    }
}

impl Drop for LiveRoster {
    fn drop(&mut self) {
        self.connection.shutdown();
        if let Some(consumer) = self.consumer.lock().take() {
            consumer.abort();
        }
    }
}

/// Apply live events to the collection in delivery order
async fn consume_events(
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    collection: CollectionHandle,
    arrivals: Arc<Mutex<ArrivalQueue>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Message(raw) => match decode(&raw) {
                Ok(LiveEvent::PersonJoined { person }) => {
                    let id = person.id;
                    // Refused once teardown closed the queue
                    if collection.upsert_front(person.clone()).await.is_committed()
                        && arrivals.lock().push(person).is_some()
                    {
                        tracing::debug!(person_id = %id, "Person joined");
                    }
                }
                Ok(LiveEvent::PersonUpdated { person }) => {
                    let id = person.id;
                    collection.update_in_place(person).await;
                    tracing::debug!(person_id = %id, "Person updated");
                }
                Ok(LiveEvent::Unknown { tag }) => {
                    tracing::debug!(tag = %tag, "Ignoring unknown live event");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed live frame");
                }
            },
            ConnectionEvent::Connected => {
                tracing::debug!("Live stream connected");
            }
            ConnectionEvent::Closed { code, reason } => {
                tracing::debug!(code, reason = %reason, "Live stream closed");
            }
            ConnectionEvent::Error(e) => {
                tracing::debug!(error = %e, "Live stream error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FetchRequest, Method};
    use crate::config::{ApiConfig, PaginationConfig, RealtimeConfig};
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Notify;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{accept_async, WebSocketStream};
    use uuid::Uuid;

    type ServerSocket = WebSocketStream<TcpStream>;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// Two pages of two persons (ids 1..=4); PUT echoes the update
    #[derive(Default)]
    struct Backend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetch for Backend {
        async fn fetch(&self, request: FetchRequest) -> FetchResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request.method {
                Method::Get => {
                    let page: u128 = request
                        .param_value("page")
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(1);
                    let first = (page - 1) * 2 + 1;
                    Ok(json!({
                        "count": 4,
                        "current_page": page,
                        "total_pages": 2,
                        "has_next": page < 2,
                        "results": [
                            {"id": id(first).to_string()},
                            {"id": id(first + 1).to_string()}
                        ]
                    }))
                }
                Method::Put => {
                    let person_id = request
                        .path
                        .trim_start_matches("client/person/")
                        .trim_end_matches('/')
                        .to_string();
                    let body = request.body.unwrap_or(Value::Null);
                    Ok(json!({"id": person_id, "full_name": body["full_name"]}))
                }
                other => Err(FetchError::InvalidRequest(format!("unexpected {}", other))),
            }
        }
    }

    async fn spawn_server() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(ws);
                }
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn config(base_url: String) -> Config {
        Config {
            api: ApiConfig {
                base_url,
                ..ApiConfig::default()
            },
            realtime: RealtimeConfig {
                reconnect_interval_ms: 50,
                ..RealtimeConfig::default()
            },
            pagination: PaginationConfig { page_size: 2 },
            ..Config::default()
        }
    }

    async fn accept(rx: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for session")
            .expect("server stopped")
    }

    async fn wait_for(
        rx: &mut watch::Receiver<Arc<RosterSnapshot>>,
        pred: impl Fn(&RosterSnapshot) -> bool,
    ) -> Arc<RosterSnapshot> {
        timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    fn joined(n: u128) -> Message {
        Message::text(json!({"event": "person_joined", "person": {"id": id(n).to_string()}}).to_string())
    }

    fn ids(snapshot: &RosterSnapshot) -> Vec<Uuid> {
        snapshot.persons.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_live_events_merge_with_first_page() {
        let (base_url, mut sessions) = spawn_server().await;
        let roster = LiveRoster::mount(&config(base_url), Arc::new(Backend::default())).await;
        let mut server = accept(&mut sessions).await;
        let mut rx = roster.subscribe();

        let snapshot = roster.snapshot();
        assert_eq!(ids(&snapshot), vec![id(1), id(2)]);
        assert_eq!(snapshot.count, 4);

        server.send(joined(9)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| s.persons.len() == 3).await;
        assert_eq!(ids(&snapshot), vec![id(9), id(1), id(2)]);
        assert_eq!(snapshot.count, 5);

        server.send(joined(1)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| s.persons[0].id == id(1)).await;
        assert_eq!(ids(&snapshot), vec![id(1), id(9), id(2)]);
        assert_eq!(snapshot.count, 5);

        // Malformed frames and unknown tags leave the stream usable
        server.send(Message::text("garbage")).await.unwrap();
        server
            .send(Message::text(r#"{"event": "person_left"}"#))
            .await
            .unwrap();
        server
            .send(Message::text(
                json!({"event": "person_updated", "person": {"id": id(2).to_string(), "full_name": "Two"}})
                    .to_string(),
            ))
            .await
            .unwrap();
        let snapshot = wait_for(&mut rx, |s| {
            s.persons.iter().any(|p| p.full_name.as_deref() == Some("Two"))
        })
        .await;
        assert_eq!(snapshot.persons[2].id, id(2));

        // Update for an id that was never loaded is dropped
        server
            .send(Message::text(
                json!({"event": "person_updated", "person": {"id": id(77).to_string()}}).to_string(),
            ))
            .await
            .unwrap();
        server.send(joined(3)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| s.persons[0].id == id(3)).await;
        assert!(!ids(&snapshot).contains(&id(77)));

        assert_eq!(roster.current_arrival().map(|a| a.person.id), Some(id(9)));
        assert_eq!(roster.pending_arrivals(), 2);
        assert_eq!(roster.dismiss_arrival().map(|a| a.person.id), Some(id(1)));

        roster.teardown().await;
    }

    #[tokio::test]
    async fn test_load_more_skips_live_duplicates() {
        let (base_url, mut sessions) = spawn_server().await;
        let roster = LiveRoster::mount(&config(base_url), Arc::new(Backend::default())).await;
        let mut server = accept(&mut sessions).await;
        let mut rx = roster.subscribe();

        // Person 3 arrives live before page 2 is loaded
        server.send(joined(3)).await.unwrap();
        wait_for(&mut rx, |s| s.persons.len() == 3).await;

        let outcome = roster.load_more().await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                page: 2,
                received: 2
            }
        );
        let snapshot = roster.snapshot();
        assert_eq!(ids(&snapshot), vec![id(3), id(1), id(2), id(4)]);
        assert!(!roster.has_next_page());
        assert_eq!(roster.load_more().await.unwrap(), LoadOutcome::Exhausted);

        roster.teardown().await;
    }

    #[tokio::test]
    async fn test_update_person_replaces_in_place() {
        let (base_url, mut sessions) = spawn_server().await;
        let roster = LiveRoster::mount(&config(base_url), Arc::new(Backend::default())).await;
        let _server = accept(&mut sessions).await;

        let update = PersonUpdate {
            full_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let person = roster.update_person(id(2), &update).await.unwrap();
        assert_eq!(person.full_name.as_deref(), Some("Ada"));

        let snapshot = roster.snapshot();
        assert_eq!(ids(&snapshot), vec![id(1), id(2)]);
        assert_eq!(snapshot.persons[1].full_name.as_deref(), Some("Ada"));

        roster.teardown().await;
    }

    #[tokio::test]
    async fn test_teardown_closes_and_freezes_state() {
        let (base_url, mut sessions) = spawn_server().await;
        let backend = Arc::new(Backend::default());
        let roster = LiveRoster::mount(&config(base_url), backend.clone()).await;
        let mut server = accept(&mut sessions).await;

        roster.teardown().await;
        assert!(roster.is_torn_down());
        assert_eq!(roster.connection_state(), ConnectionState::Disconnected);

        match timeout(Duration::from_secs(5), server.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("unexpected frame: {:?}", other),
        }

        let before = roster.snapshot();
        let calls = backend.calls.load(Ordering::SeqCst);
        assert_eq!(roster.load_more().await.unwrap(), LoadOutcome::Discarded);
        assert_eq!(roster.refresh().await.unwrap(), LoadOutcome::Discarded);
        assert_eq!(roster.snapshot(), before);
        assert_eq!(backend.calls.load(Ordering::SeqCst), calls);
        assert!(roster.current_arrival().is_none());

        roster.host_became_active();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = roster.connection_stats();
        assert_eq!(stats.reconnects_scheduled, 0);
        assert_eq!(stats.sessions_opened, 1);
        assert!(sessions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_page_after_teardown_leaves_no_error() {
        /// First page succeeds; later pages wait for the gate, then fail
        struct Stalling {
            gate: Arc<Notify>,
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Fetch for Stalling {
            async fn fetch(&self, request: FetchRequest) -> FetchResult<Value> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if request.param_value("page") == Some("1") {
                    return Ok(json!({
                        "count": 4,
                        "has_next": true,
                        "results": [{"id": id(1).to_string()}, {"id": id(2).to_string()}]
                    }));
                }
                self.gate.notified().await;
                Err(FetchError::Unavailable("late failure".to_string()))
            }
        }

        let gate = Arc::new(Notify::new());
        let backend = Arc::new(Stalling {
            gate: gate.clone(),
            calls: AtomicUsize::new(0),
        });
        let (base_url, mut sessions) = spawn_server().await;
        let roster = Arc::new(LiveRoster::mount(&config(base_url), backend.clone()).await);
        let _server = accept(&mut sessions).await;

        let pending = {
            let roster = roster.clone();
            tokio::spawn(async move { roster.load_more().await })
        };
        while !roster.is_loading() {
            tokio::task::yield_now().await;
        }

        roster.teardown().await;
        let error_before = roster.last_page_error();
        let snapshot_before = roster.snapshot();
        gate.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert_eq!(roster.last_page_error(), error_before);
        assert_eq!(roster.last_page_error(), None);
        assert_eq!(roster.snapshot(), snapshot_before);
        assert!(!roster.is_loading());

        let calls = backend.calls.load(Ordering::SeqCst);
        assert_eq!(roster.load_more().await.unwrap(), LoadOutcome::Discarded);
        assert_eq!(backend.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_mount_survives_failed_first_page() {
        struct Down;

        #[async_trait]
        impl Fetch for Down {
            async fn fetch(&self, _request: FetchRequest) -> FetchResult<Value> {
                Err(FetchError::Unavailable("backend down".to_string()))
            }
        }

        let (base_url, mut sessions) = spawn_server().await;
        let roster = LiveRoster::mount(&config(base_url), Arc::new(Down)).await;
        let _server = accept(&mut sessions).await;

        assert!(matches!(
            roster.last_page_error(),
            Some(FetchError::Unavailable(_))
        ));
        assert!(roster.snapshot().persons.is_empty());
        assert!(roster.refresh().await.is_err());

        roster.teardown().await;
    }
}
