//! Live event decoding
//!
//! Inbound frames look like `{"event": "person_joined", "person": {...}}`.
//! A frame that cannot be decoded is reported to the caller, which logs and
//! drops it; the connection itself is never affected.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::Person;

/// Event tag for a newly detected person
pub const PERSON_JOINED: &str = "person_joined";
/// Event tag for an updated person
pub const PERSON_UPDATED: &str = "person_updated";

/// A decoded push event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    PersonJoined { person: Person },
    PersonUpdated { person: Person },
    /// A tag this client does not know; ignored downstream
    Unknown { tag: String },
}

impl LiveEvent {
    /// Wire tag of the event
    pub fn tag(&self) -> &str {
        match self {
            LiveEvent::PersonJoined { .. } => PERSON_JOINED,
            LiveEvent::PersonUpdated { .. } => PERSON_UPDATED,
            LiveEvent::Unknown { tag } => tag,
        }
    }
}

/// Why a frame was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Frame is not valid JSON: {0}")]
    NotJson(String),

    #[error("Frame is not a JSON object")]
    NotObject,

    #[error("Frame has no string 'event' tag")]
    MissingTag,

    #[error("Invalid person in '{tag}' event: {error}")]
    InvalidPerson { tag: String, error: String },
}

/// Decode one raw text frame
pub fn decode(raw: &str) -> Result<LiveEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let Value::Object(mut frame) = value else {
        return Err(DecodeError::NotObject);
    };

    let tag = match frame.get("event") {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(DecodeError::MissingTag),
    };

    match tag.as_str() {
        PERSON_JOINED | PERSON_UPDATED => {
            let person = frame.remove("person").unwrap_or(Value::Null);
            let person: Person =
                serde_json::from_value(person).map_err(|e| DecodeError::InvalidPerson {
                    tag: tag.clone(),
                    error: e.to_string(),
                })?;
            if tag == PERSON_JOINED {
                Ok(LiveEvent::PersonJoined { person })
            } else {
                Ok(LiveEvent::PersonUpdated { person })
            }
        }
        _ => Ok(LiveEvent::Unknown { tag }),
    }
}
