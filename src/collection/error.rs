//! Collection invariant errors

use thiserror::Error;

use crate::model::PersonId;

/// A broken collection invariant
///
/// Never user-recoverable: the mutation primitives are written so that none
/// of these can occur, so seeing one means a defect in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The same person appears more than once
    #[error("Duplicate person {id} at positions {first} and {second}")]
    DuplicateKey {
        id: PersonId,
        first: usize,
        second: usize,
    },
}
