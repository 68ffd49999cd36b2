//! Single-writer collection handle
//!
//! Live events and page completions arrive on different tasks. Every
//! mutation goes through `CollectionHandle::apply`, which runs the pure
//! primitive inside one exclusive critical section, checks the invariants,
//! and publishes a snapshot for renderers. After `detach` (teardown) the
//! collection is gone and late mutations are discarded.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::store::{Cursor, PersonCollection};
use crate::model::{PageInfo, Person};

/// Immutable view of the collection handed to renderers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterSnapshot {
    /// Persons, most recently active first
    pub persons: Vec<Person>,
    /// Authoritative server-side total
    pub count: u64,
    pub cursor: Cursor,
    /// Number of committed mutations so far
    pub version: u64,
}

impl RosterSnapshot {
    fn capture(collection: &PersonCollection, version: u64) -> Self {
        Self {
            persons: collection.persons().to_vec(),
            count: collection.count(),
            cursor: collection.cursor(),
            version,
        }
    }
}

/// Result of applying a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The mutation was committed as this version
    Committed { version: u64 },
    /// The collection was torn down; nothing changed
    Detached,
}

impl Applied {
    pub fn is_committed(&self) -> bool {
        matches!(self, Applied::Committed { .. })
    }
}

struct Slot {
    collection: Option<PersonCollection>,
    version: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    snapshots: watch::Sender<Arc<RosterSnapshot>>,
}

/// Cloneable handle to the one collection owned by a roster
#[derive(Clone)]
pub struct CollectionHandle {
    shared: Arc<Shared>,
}

impl CollectionHandle {
    /// Create a handle around an empty collection
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(RosterSnapshot::default()));
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    collection: Some(PersonCollection::new()),
                    version: 0,
                }),
                snapshots,
            }),
        }
    }

    /// Apply a state transition under the collection lock
    ///
    /// `op` names the primitive for logging.
    pub async fn apply<F>(&self, op: &'static str, transition: F) -> Applied
    where
        F: FnOnce(PersonCollection) -> PersonCollection,
    {
        self.apply_if(op, || true, transition)
            .await
            .unwrap_or(Applied::Detached)
    }

    /// Apply a transition only if `still_current` holds once the lock is taken
    ///
    /// Returns `None` when the guard rejects the mutation; the collection and
    /// its version are left untouched. The guard is not consulted when the
    /// collection is detached.
    pub async fn apply_if<G, F>(
        &self,
        op: &'static str,
        still_current: G,
        transition: F,
    ) -> Option<Applied>
    where
        G: FnOnce() -> bool,
        F: FnOnce(PersonCollection) -> PersonCollection,
    {
        let mut slot = self.shared.slot.lock().await;
        if slot.collection.is_none() {
            tracing::debug!(op, "Collection detached, mutation discarded");
            return Some(Applied::Detached);
        }
        if !still_current() {
            tracing::debug!(op, "Stale mutation rejected");
            return None;
        }
        let current = slot.collection.take()?;

        let next = transition(current);
        let violation = next.check_invariants().err();
        if let Some(violation) = &violation {
            tracing::error!(op, error = %violation, "Collection invariant violated");
        }

        slot.version += 1;
        let version = slot.version;
        let snapshot = Arc::new(RosterSnapshot::capture(&next, version));
        slot.collection = Some(next);
        self.shared.snapshots.send_replace(snapshot);
        drop(slot);

        debug_assert!(
            violation.is_none(),
            "collection invariant violated by {op}: {violation:?}"
        );

        tracing::trace!(op, version, "Collection mutation committed");
        Some(Applied::Committed { version })
    }

    /// Replace the collection with a first page
    pub async fn initialize(&self, count: u64, records: Vec<Person>, info: PageInfo) -> Applied {
        self.apply("initialize", move |_| {
            PersonCollection::initialized(count, records, info)
        })
        .await
    }

    /// Append a further page
    pub async fn append_page(&self, records: Vec<Person>, info: PageInfo) -> Applied {
        self.apply("append_page", move |c| c.append_page(records, info))
            .await
    }

    /// Move or insert a person at the front
    pub async fn upsert_front(&self, person: Person) -> Applied {
        self.apply("upsert_front", move |c| c.upsert_front(person))
            .await
    }

    /// Replace a loaded person in place
    pub async fn update_in_place(&self, person: Person) -> Applied {
        self.apply("update_in_place", move |c| c.update_in_place(person))
            .await
    }

    /// Run a read-only closure against the live collection
    ///
    /// Returns `None` once detached.
    pub async fn read<R>(&self, f: impl FnOnce(&PersonCollection) -> R) -> Option<R> {
        let slot = self.shared.slot.lock().await;
        slot.collection.as_ref().map(f)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<RosterSnapshot> {
        self.shared.snapshots.borrow().clone()
    }

    /// Receive a new snapshot after every committed mutation
    pub fn subscribe(&self) -> watch::Receiver<Arc<RosterSnapshot>> {
        self.shared.snapshots.subscribe()
    }

    /// Tear the collection down; later mutations become no-ops
    pub async fn detach(&self) {
        let mut slot = self.shared.slot.lock().await;
        if slot.collection.take().is_some() {
            tracing::debug!(version = slot.version, "Collection detached");
        }
    }

    pub async fn is_detached(&self) -> bool {
        self.shared.slot.lock().await.collection.is_none()
    }
}

impl Default for CollectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn person(n: u128) -> Person {
        Person::new(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn test_mutations_publish_snapshots() {
        let handle = CollectionHandle::new();
        let mut rx = handle.subscribe();

        let applied = handle
            .initialize(2, vec![person(1), person(2)], PageInfo::single(2))
            .await;
        assert_eq!(applied, Applied::Committed { version: 1 });

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.persons.len(), 2);
        assert_eq!(snapshot.version, 1);

        handle.upsert_front(person(3)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.persons[0].id, Uuid::from_u128(3));
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.version, 2);
    }

    #[tokio::test]
    async fn test_detached_discards_mutations() {
        let handle = CollectionHandle::new();
        handle.upsert_front(person(1)).await;
        let before = handle.snapshot();

        handle.detach().await;
        assert!(handle.is_detached().await);

        assert_eq!(handle.upsert_front(person(2)).await, Applied::Detached);
        assert_eq!(
            handle.append_page(vec![person(3)], PageInfo::single(1)).await,
            Applied::Detached
        );
        assert_eq!(handle.snapshot(), before);
        assert!(handle.read(|c| c.len()).await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_guard_leaves_version() {
        let handle = CollectionHandle::new();
        handle.upsert_front(person(1)).await;

        let rejected = handle
            .apply_if("append_page", || false, |c| {
                c.append_page(vec![person(2)], PageInfo::single(2))
            })
            .await;
        assert_eq!(rejected, None);
        assert_eq!(handle.snapshot().version, 1);
        assert_eq!(handle.snapshot().persons.len(), 1);

        let accepted = handle
            .apply_if("append_page", || true, |c| {
                c.append_page(vec![person(2)], PageInfo::single(2))
            })
            .await;
        assert_eq!(accepted, Some(Applied::Committed { version: 2 }));
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_uniqueness() {
        let handle = CollectionHandle::new();
        let mut tasks = Vec::new();
        for worker in 0u128..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0u128..50 {
                    let id = (worker * 50 + n) % 20;
                    if n % 2 == 0 {
                        handle.upsert_front(person(id)).await;
                    } else {
                        handle
                            .append_page(vec![person(id)], PageInfo::single(20))
                            .await;
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let ok = handle.read(|c| c.check_invariants().is_ok()).await;
        assert_eq!(ok, Some(true));
        assert!(handle.snapshot().persons.len() <= 20);
    }
}
