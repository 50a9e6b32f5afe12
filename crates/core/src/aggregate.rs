//! Aggregate root trait and optimistic concurrency expectations.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Stores key records by [`AggregateRoot::id`] and guard updates with
/// [`AggregateRoot::version`].
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the persisted state.
    ///
    /// Stores bump this by one on every successful update; a record that was
    /// never persisted reports 0.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a persisted record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expect the version `record` was loaded at.
    pub fn of<A: AggregateRoot + ?Sized>(record: &A) -> Self {
        ExpectedVersion::Exact(record.version())
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected == actual => Ok(()),
            ExpectedVersion::Exact(expected) => Err(DomainError::conflict(format!(
                "expected version {expected}, found {actual}"
            ))),
        }
    }
}
