//! Arrival notifications
//!
//! Every joined person is announced to the operator, one notice at a time.
//! Pushing while a notice is showing queues the new arrival behind it.

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;

use crate::model::Person;

/// One arrival notice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrival {
    /// Unique per notice, even for repeated arrivals of the same person
    pub notice_id: String,
    pub person: Person,
}

/// FIFO of arrival notices with one current notice
#[derive(Debug, Default)]
pub struct ArrivalQueue {
    current: Option<Arrival>,
    queued: VecDeque<Arrival>,
    seq: u64,
    closed: bool,
}

impl ArrivalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce a person; shown immediately if nothing is showing
    ///
    /// Returns `None` once the queue is closed.
    pub fn push(&mut self, person: Person) -> Option<&Arrival> {
        if self.closed {
            tracing::debug!(person_id = %person.id, "Arrival after close dropped");
            return None;
        }
        self.seq += 1;
        let arrival = Arrival {
            notice_id: format!("{}-{}-{}", person.id, Utc::now().timestamp_millis(), self.seq),
            person,
        };

        if self.current.is_none() {
            tracing::debug!(notice_id = %arrival.notice_id, "Showing arrival");
            Some(&*self.current.insert(arrival))
        } else {
            tracing::debug!(notice_id = %arrival.notice_id, queued = self.queued.len() + 1, "Arrival queued");
            self.queued.push_back(arrival);
            self.queued.back()
        }
    }

    /// The notice currently showing
    pub fn current(&self) -> Option<&Arrival> {
        self.current.as_ref()
    }

    /// Dismiss the current notice and show the next queued one
    pub fn close_current(&mut self) -> Option<&Arrival> {
        self.current = self.queued.pop_front();
        self.current.as_ref()
    }

    /// Drop the current notice and everything queued
    pub fn clear(&mut self) {
        self.current = None;
        self.queued.clear();
    }

    /// Clear and refuse every later push
    pub fn close(&mut self) {
        self.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of notices waiting behind the current one
    pub fn pending(&self) -> usize {
        self.queued.len()
    }

    pub fn is_showing(&self) -> bool {
        self.current.is_some()
    }
}
