//! Domain Types
//!
//! Records shared by the collection store, the page fetcher and the live
//! event decoder:
//! - `Person`: one detected person and its profile
//! - `Page` / `PageInfo`: one slice of the paginated person listing

mod page;
mod person;

pub use page::{Page, PageInfo, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use person::{Person, PersonId, PersonUpdate};
