//! Live event stream
//!
//! `ConnectionManager` keeps one WebSocket session to the backend open and
//! reports its lifecycle on a channel; `decode` turns raw text frames into
//! typed `LiveEvent`s.

mod connection;
mod decoder;
mod state;

pub use connection::{ConnectionManager, MANUAL_RECONNECT_REASON, SHUTDOWN_REASON};
pub use decoder::{decode, DecodeError, LiveEvent, PERSON_JOINED, PERSON_UPDATED};
pub use state::{
    ConnectionEvent, ConnectionState, ConnectionStats, TransportError, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE,
};
