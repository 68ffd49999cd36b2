//! Person records
//!
//! A `Person` is one entity detected by the sensing system. Only the id is
//! guaranteed; every profile field stays `None` until the backend (or an
//! operator edit) fills it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity key of a person
pub type PersonId = Uuid;

/// A detected person as delivered by the listing endpoint and live events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    /// Stable identity key
    pub id: PersonId,
    /// Display name entered by an operator
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Image reference (URL or storage path)
    #[serde(default)]
    pub image: Option<String>,
    /// Estimated age
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    /// First seen
    #[serde(default)]
    pub entry_time: Option<DateTime<Utc>>,
    /// Last seen
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Person {
    /// Create a person with only an identity
    pub fn new(id: PersonId) -> Self {
        Self {
            id,
            full_name: None,
            phone_number: None,
            image: None,
            age: None,
            gender: None,
            emotion: None,
            body_type: None,
            entry_time: None,
            exit_time: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Builder method: set the display name
    pub fn full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    /// Builder method: set the estimated age
    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    /// Builder method: set the detected emotion
    pub fn emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    /// Builder method: set the last-seen timestamp
    pub fn exit_time(mut self, at: DateTime<Utc>) -> Self {
        self.exit_time = Some(at);
        self
    }

    /// Name to show in listings, falling back to "Unknown"
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unknown")
    }
}

/// Partial update sent to the person update endpoint
///
/// Only the fields that are `Some` are serialized, matching the backend's
/// partial-update semantics.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PersonUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
}

impl PersonUpdate {
    /// True if the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.emotion.is_none()
            && self.body_type.is_none()
    }
}
