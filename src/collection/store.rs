//! Paginated person collection
//!
//! `PersonCollection` is a plain value: every mutation consumes the old state
//! and returns the next one, so the same primitives serve the live event path,
//! the page fetcher, and unit tests without any shared mutable aliasing.
//!
//! Ordering is "most recently active first". Pages append at the back, live
//! arrivals go to the front.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::error::InvariantViolation;
use crate::model::{PageInfo, Person, PersonId};

/// Pagination position of the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    /// Last page merged into the collection (0 = nothing loaded yet)
    pub current_page: u32,
    /// Total pages reported by the server
    pub total_pages: u32,
    /// Whether the server has more pages after `current_page`
    pub has_next: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            current_page: 0,
            total_pages: 0,
            has_next: true,
        }
    }
}

impl From<PageInfo> for Cursor {
    fn from(info: PageInfo) -> Self {
        Self {
            current_page: info.current_page,
            total_pages: info.total_pages,
            has_next: info.has_next,
        }
    }
}

/// Ordered, deduplicated set of persons plus pagination metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonCollection {
    persons: Vec<Person>,
    count: u64,
    cursor: Cursor,
}

impl PersonCollection {
    /// Create an empty collection (nothing loaded yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole state with a fresh first load
    ///
    /// Repeated ids inside `records` keep their first occurrence.
    pub fn initialized(count: u64, records: Vec<Person>, info: PageInfo) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let persons: Vec<Person> = records
            .into_iter()
            .filter(|p| seen.insert(p.id))
            .collect();

        Self {
            persons,
            count,
            cursor: info.into(),
        }
    }

    /// Append a further page after the current sequence
    ///
    /// Records already present (from a live event or an earlier page whose
    /// offsets shifted) are skipped so the uniqueness invariant holds; the
    /// existing entry keeps its position and value. Count and cursor follow
    /// the page metadata.
    pub fn append_page(mut self, records: Vec<Person>, info: PageInfo) -> Self {
        let mut seen: HashSet<PersonId> = self.persons.iter().map(|p| p.id).collect();
        let before = self.persons.len();
        let offered = records.len();

        self.persons
            .extend(records.into_iter().filter(|p| seen.insert(p.id)));

        let skipped = offered - (self.persons.len() - before);
        if skipped > 0 {
            tracing::debug!(
                page = info.current_page,
                skipped,
                "Skipped persons already present in collection"
            );
        }

        self.count = info.count;
        self.cursor = info.into();
        self
    }

    /// Insert `person` at the front, moving it there if already present
    ///
    /// A new id increments the total count by one; a known id keeps the count
    /// and takes the supplied value.
    pub fn upsert_front(mut self, person: Person) -> Self {
        match self.position(&person.id) {
            Some(pos) => {
                self.persons.remove(pos);
            }
            None => {
                self.count += 1;
            }
        }
        self.persons.insert(0, person);
        self
    }

    /// Replace the record with the same id at its current position
    ///
    /// An unknown id is a no-op: the record may live on a page that has not
    /// been loaded yet.
    pub fn update_in_place(mut self, person: Person) -> Self {
        match self.position(&person.id) {
            Some(pos) => self.persons[pos] = person,
            None => {
                tracing::debug!(person_id = %person.id, "Update for unloaded person ignored");
            }
        }
        self
    }

    /// Verify the collection invariants
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut positions: HashMap<PersonId, usize> = HashMap::with_capacity(self.persons.len());
        for (idx, person) in self.persons.iter().enumerate() {
            if let Some(first) = positions.insert(person.id, idx) {
                return Err(InvariantViolation::DuplicateKey {
                    id: person.id,
                    first,
                    second: idx,
                });
            }
        }
        Ok(())
    }

    /// Materialized persons, most recently active first
    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    /// Authoritative server-side total
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Number of locally materialized persons
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Position of a person in the ordering
    pub fn position(&self, id: &PersonId) -> Option<usize> {
        self.persons.iter().position(|p| &p.id == id)
    }

    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.persons.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.position(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn person(n: u128) -> Person {
        Person::new(Uuid::from_u128(n))
    }

    fn ids(c: &PersonCollection) -> Vec<u128> {
        c.persons().iter().map(|p| p.id.as_u128()).collect()
    }

    fn page(current: u32, total: u32, count: u64, has_next: bool) -> PageInfo {
        PageInfo {
            count,
            current_page: current,
            total_pages: total,
            has_next,
        }
    }

    #[test]
    fn test_new_collection() {
        let c = PersonCollection::new();
        assert!(c.is_empty());
        assert_eq!(c.count(), 0);
        assert_eq!(c.cursor().current_page, 0);
        assert!(c.cursor().has_next);
    }

    #[test]
    fn test_join_and_rejoin_scenario() {
        // [A, B] -> C joins -> [C, A, B]; A re-detected -> [A, C, B]
        let (a, b, c) = (1, 2, 3);
        let col = PersonCollection::initialized(2, vec![person(a), person(b)], PageInfo::single(2));

        let col = col.upsert_front(person(c));
        assert_eq!(ids(&col), vec![c, a, b]);
        assert_eq!(col.count(), 3);

        let col = col.upsert_front(person(a));
        assert_eq!(ids(&col), vec![a, c, b]);
        assert_eq!(col.count(), 3);
        assert!(col.check_invariants().is_ok());
    }

    #[test]
    fn test_upsert_front_twice_counts_once() {
        let col = PersonCollection::initialized(1, vec![person(1)], PageInfo::single(1));
        let joined = person(9).full_name("Nine");

        let col = col.upsert_front(joined.clone());
        assert_eq!(col.persons()[0], joined);
        assert_eq!(col.count(), 2);

        let col = col.upsert_front(joined.clone());
        assert_eq!(col.persons()[0], joined);
        assert_eq!(col.count(), 2);
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_upsert_front_takes_new_value() {
        let col = PersonCollection::initialized(2, vec![person(1), person(2)], PageInfo::single(2));
        let col = col.upsert_front(person(2).emotion("calm"));
        assert_eq!(col.persons()[0].emotion.as_deref(), Some("calm"));
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_update_in_place_preserves_positions() {
        let col = PersonCollection::initialized(
            4,
            vec![person(1), person(2), person(3), person(4)],
            PageInfo::single(4),
        );
        let col = col.update_in_place(person(3).full_name("Three"));

        assert_eq!(ids(&col), vec![1, 2, 3, 4]);
        assert_eq!(col.persons()[2].full_name.as_deref(), Some("Three"));
        assert_eq!(col.count(), 4);
    }

    #[test]
    fn test_update_unknown_is_noop() {
        let col = PersonCollection::initialized(2, vec![person(1), person(2)], PageInfo::single(2));
        let before = col.clone();
        let col = col.update_in_place(person(42).full_name("Ghost"));
        assert_eq!(col, before);
    }

    #[test]
    fn test_append_page_updates_cursor() {
        let col = PersonCollection::initialized(4, vec![person(1), person(2)], page(1, 2, 4, true));
        let col = col.append_page(vec![person(3), person(4)], page(2, 2, 4, false));

        assert_eq!(ids(&col), vec![1, 2, 3, 4]);
        assert_eq!(col.count(), 4);
        assert_eq!(
            col.cursor(),
            Cursor {
                current_page: 2,
                total_pages: 2,
                has_next: false
            }
        );
    }

    #[test]
    fn test_append_page_skips_known_ids() {
        // Person 5 joined live, then shows up again on page 2
        let col = PersonCollection::initialized(4, vec![person(1), person(2)], page(1, 3, 4, true))
            .upsert_front(person(5).full_name("live"));
        let col = col.append_page(vec![person(5), person(3), person(3)], page(2, 3, 5, true));

        assert_eq!(ids(&col), vec![5, 1, 2, 3]);
        assert_eq!(col.persons()[0].full_name.as_deref(), Some("live"));
        assert!(col.check_invariants().is_ok());
    }

    #[test]
    fn test_initialized_drops_repeats() {
        let col = PersonCollection::initialized(
            3,
            vec![person(1), person(2).full_name("first"), person(2)],
            PageInfo::single(3),
        );
        assert_eq!(ids(&col), vec![1, 2]);
        assert_eq!(col.persons()[1].full_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_uniqueness_over_mixed_sequence() {
        let mut col = PersonCollection::new();
        for step in 0u128..200 {
            let id = (step * 7) % 13;
            col = match step % 4 {
                0 => col.upsert_front(person(id)),
                1 => col.update_in_place(person(id).age(step as u32)),
                2 => col.append_page(
                    vec![person(id), person((id + 1) % 13)],
                    page(step as u32, 100, 13, true),
                ),
                _ => {
                    if step % 50 == 3 {
                        PersonCollection::initialized(2, vec![person(id), person(id)], PageInfo::single(2))
                    } else {
                        col.upsert_front(person(id + 1))
                    }
                }
            };
            assert!(col.check_invariants().is_ok(), "duplicate after step {step}");
        }
    }

    #[test]
    fn test_check_invariants_reports_duplicate() {
        let col = PersonCollection {
            persons: vec![person(1), person(2), person(1)],
            count: 3,
            cursor: Cursor::default(),
        };
        let err = col.check_invariants().unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::DuplicateKey {
                id: Uuid::from_u128(1),
                first: 0,
                second: 2
            }
        );
    }
}
