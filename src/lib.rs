//! # Roster
//!
//! Live person roster client - keeps an in-memory, ordered roster of detected
//! persons in sync with a backend through a paginated REST listing and a
//! WebSocket event stream.
//!
//! ## Features
//!
//! - **Reconciliation**: first page, further pages and push events merge into
//!   one deduplicated collection with move-to-front semantics
//! - **Single writer**: every mutation runs under one lock and publishes a
//!   snapshot on a watch channel
//! - **Resilient stream**: automatic reconnect after unintended closes,
//!   manual reconnect, host-active checks
//! - **Sequential paging**: one page request in flight, stale completions
//!   discarded after reset or teardown
//!
//! ## Modules
//!
//! - [`collection`]: Collection primitives and the single-writer handle
//! - [`client`]: `Fetch` capability, reqwest client and endpoint services
//! - [`pager`]: Sequential page loading
//! - [`realtime`]: WebSocket connection manager and event decoding
//! - [`roster`]: `LiveRoster` coordinator and arrival notices
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roster::client::HttpClient;
//! use roster::config::Config;
//! use roster::LiveRoster;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let fetch = Arc::new(HttpClient::new(&config.api)?);
//!
//!     // Connects the live stream and loads page 1
//!     let roster = LiveRoster::mount(&config, fetch).await;
//!     roster.load_more().await?;
//!
//!     let mut snapshots = roster.subscribe();
//!     snapshots.changed().await?;
//!     println!("{} persons shown", snapshots.borrow().persons.len());
//!
//!     roster.teardown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collection;
pub mod config;
pub mod model;
pub mod pager;
pub mod realtime;
pub mod roster;

pub use collection::{CollectionHandle, PersonCollection, RosterSnapshot};
pub use config::Config;
pub use model::{Person, PersonId, PersonUpdate};
pub use pager::{LoadOutcome, PageFetcher};
pub use realtime::{ConnectionManager, ConnectionState, LiveEvent};
pub use roster::LiveRoster;
