//! Page Fetcher
//!
//! Sequential retrieval of the person listing. At most one page request is in
//! flight per collection; the next page index is derived from the last page
//! that actually committed, so page N+1 is never requested before page N
//! landed in the collection.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::client::{Fetch, FetchError, FetchResult, PersonsApi};
use crate::collection::{Applied, CollectionHandle, PersonCollection};

/// Outcome of a page load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The page was merged into the collection
    Loaded { page: u32, received: usize },
    /// Another page request is still in flight
    AlreadyLoading,
    /// The server reported no further pages
    Exhausted,
    /// The response arrived after a reset or teardown and was dropped, or
    /// the pager is closed
    Discarded,
}

#[derive(Debug)]
struct PagerState {
    /// Last page index merged into the collection (0 = none yet)
    confirmed_page: u32,
    has_next: bool,
    in_flight: bool,
    /// Bumped by every reset; completions from older generations are dropped
    generation: u64,
    last_error: Option<FetchError>,
    /// Set once by `close`; no further requests are issued
    closed: bool,
}

impl PagerState {
    fn fresh(generation: u64) -> Self {
        Self {
            confirmed_page: 0,
            has_next: true,
            in_flight: false,
            generation,
            last_error: None,
            closed: false,
        }
    }

    /// Start a new generation, keeping the closed flag
    fn restart(&mut self) -> u64 {
        let generation = self.generation + 1;
        *self = Self {
            closed: self.closed,
            ..Self::fresh(generation)
        };
        generation
    }
}

/// Loads listing pages into a collection
pub struct PageFetcher {
    persons: PersonsApi,
    collection: CollectionHandle,
    page_size: u32,
    state: Mutex<PagerState>,
}

impl PageFetcher {
    pub fn new(fetch: Arc<dyn Fetch>, collection: CollectionHandle, page_size: u32) -> Self {
        Self {
            persons: PersonsApi::new(fetch),
            collection,
            page_size,
            state: Mutex::new(PagerState::fresh(0)),
        }
    }

    /// Reload from page 1, replacing the collection contents
    ///
    /// Supersedes any request still in flight.
    pub async fn load_first(&self) -> FetchResult<LoadOutcome> {
        let generation = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(LoadOutcome::Discarded);
            }
            let generation = state.restart();
            state.in_flight = true;
            generation
        };
        self.load(1, generation).await
    }

    /// Load the page after the last committed one
    pub async fn load_next(&self) -> FetchResult<LoadOutcome> {
        let (page, generation) = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(LoadOutcome::Discarded);
            }
            if state.in_flight {
                return Ok(LoadOutcome::AlreadyLoading);
            }
            if !state.has_next {
                return Ok(LoadOutcome::Exhausted);
            }
            state.in_flight = true;
            (state.confirmed_page + 1, state.generation)
        };
        self.load(page, generation).await
    }

    /// Forget all pagination progress
    ///
    /// A request started before the reset completes but is not merged.
    pub fn reset(&self) {
        let generation = self.state.lock().restart();
        tracing::debug!(generation, "Pager reset");
    }

    /// Stop paging for good
    ///
    /// Requests still in flight complete as `Discarded` without touching any
    /// pager state, and later loads are refused without a request.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.in_flight = false;
        state.closed = true;
        tracing::debug!(generation = state.generation, "Pager closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.state.lock().last_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn has_next_page(&self) -> bool {
        self.state.lock().has_next
    }

    /// Last page index merged into the collection
    pub fn current_page(&self) -> u32 {
        self.state.lock().confirmed_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn load(&self, page: u32, generation: u64) -> FetchResult<LoadOutcome> {
        tracing::debug!(page, page_size = self.page_size, "Loading page");

        let result = self.persons.list_page(page, self.page_size).await;
        let listing = match result {
            Ok(listing) => listing,
            Err(err) => {
                let detached = self.collection.is_detached().await;
                let mut state = self.state.lock();
                if state.generation != generation || detached {
                    if state.generation == generation {
                        state.in_flight = false;
                    }
                    tracing::debug!(page, error = %err, "Failure of a superseded page load discarded");
                    return Ok(LoadOutcome::Discarded);
                }
                state.in_flight = false;
                state.last_error = Some(err.clone());
                drop(state);
                tracing::warn!(page, error = %err, "Page load failed");
                return Err(err);
            }
        };

        let info = listing.info;
        let received = listing.results.len();
        let records = listing.results;
        let state = &self.state;

        // Cursor commit happens under the collection lock so a reset cannot
        // slip in between the generation check and the merge.
        let commit_cursor = || {
            let mut state = state.lock();
            if state.generation != generation {
                return false;
            }
            state.confirmed_page = page;
            state.has_next = info.has_next;
            state.in_flight = false;
            state.last_error = None;
            true
        };

        let applied = if page == 1 {
            self.collection
                .apply_if("initialize", commit_cursor, move |_| {
                    PersonCollection::initialized(info.count, records, info)
                })
                .await
        } else {
            self.collection
                .apply_if("append_page", commit_cursor, move |c| {
                    c.append_page(records, info)
                })
                .await
        };

        match applied {
            Some(Applied::Committed { version }) => {
                tracing::info!(
                    page,
                    received,
                    count = info.count,
                    has_next = info.has_next,
                    version,
                    "Page loaded"
                );
                Ok(LoadOutcome::Loaded { page, received })
            }
            Some(Applied::Detached) => {
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.in_flight = false;
                }
                tracing::debug!(page, "Page arrived after teardown, discarded");
                Ok(LoadOutcome::Discarded)
            }
            None => {
                tracing::debug!(page, generation, "Page arrived after reset, discarded");
                Ok(LoadOutcome::Discarded)
            }
        }
    }
}
