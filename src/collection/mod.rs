//! Paginated Collection Store
//!
//! Holds the ordered, deduplicated list of persons shown by the roster.
//!
//! ## Architecture
//!
//! - **PersonCollection**: pure state value with the four mutation primitives
//!   (`initialized`, `append_page`, `upsert_front`, `update_in_place`)
//! - **CollectionHandle**: the single serialization point; applies primitives
//!   under one lock and publishes `RosterSnapshot`s
//!
//! ## Invariants
//!
//! - No two persons share an id
//! - Order only changes through `upsert_front`

mod error;
mod handle;
mod store;

pub use error::InvariantViolation;
pub use handle::{Applied, CollectionHandle, RosterSnapshot};
pub use store::{Cursor, PersonCollection};
