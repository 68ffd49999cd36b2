//! Roster coordination
//!
//! `LiveRoster` is the mount/teardown unit an operator view owns: one
//! collection, one live connection, one page fetcher, one arrival queue.

mod arrivals;
mod coordinator;

pub use arrivals::{Arrival, ArrivalQueue};
pub use coordinator::LiveRoster;
