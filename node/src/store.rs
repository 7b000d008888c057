//! Event store contract and an in-memory implementation.
//!
//! The store is the single arbiter of an event source's current version. A
//! commit must land exactly one commit after the stored version, otherwise it
//! is refused with `StoreError::VersionConflict`; callers never retry. A
//! commit id is accepted once.

use horizon_kernel::{
    CommitId, CommitSequenceNumber, CommittedEventStream, EventSourceId, EventSourceVersion,
    UncommittedEventStream,
};
use horizon_persistence::{EventSequenceNumbers, PersistenceError};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Version conflict on event source {event_source}: expected {expected:?}, got {actual:?}")]
    VersionConflict {
        event_source: EventSourceId,
        expected: EventSourceVersion,
        actual: EventSourceVersion,
    },
    #[error("Commit {0} is already stored")]
    DuplicateCommit(CommitId),
    #[error("Refusing to commit an empty event stream for {0}")]
    EmptyCommit(EventSourceId),
    #[error("Commit sequence unavailable: {0}")]
    Sequence(#[from] PersistenceError),
    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub trait EventStore: Send + Sync {
    /// Latest version of `event_source`, `EventSourceVersion::initial()` if it
    /// has never been committed to.
    fn version_for(&self, event_source: EventSourceId) -> Result<EventSourceVersion, StoreError>;

    fn commit(&self, uncommitted: UncommittedEventStream) -> Result<CommittedEventStream, StoreError>;
}

/// Store-wide history, read by a horizon to catch a tunnel up.
pub trait CommitHistory: Send + Sync {
    /// Commits with a sequence above `offset` in sequence order, all of them
    /// when `offset` is `None`.
    fn commits_after(&self, offset: Option<CommitSequenceNumber>) -> Result<Vec<CommittedEventStream>, StoreError>;
}

#[derive(Debug, Default)]
struct StoreState {
    versions: FxHashMap<EventSourceId, EventSourceVersion>,
    commit_ids: FxHashSet<CommitId>,
    /// Ordered by commit sequence.
    log: Vec<CommittedEventStream>,
}

pub struct InMemoryEventStore<S: EventSequenceNumbers> {
    sequence_numbers: S,
    state: RwLock<StoreState>,
}

impl<S: EventSequenceNumbers> InMemoryEventStore<S> {
    pub fn new(sequence_numbers: S) -> Self {
        Self {
            sequence_numbers,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Every commit made to `event_source`, oldest first.
    pub fn commits_for(&self, event_source: EventSourceId) -> Result<Vec<CommittedEventStream>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .log
            .iter()
            .filter(|committed| committed.source.event_source == event_source)
            .cloned()
            .collect())
    }
}

impl<S: EventSequenceNumbers> EventStore for InMemoryEventStore<S> {
    fn version_for(&self, event_source: EventSourceId) -> Result<EventSourceVersion, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .versions
            .get(&event_source)
            .copied()
            .unwrap_or_else(EventSourceVersion::initial))
    }

    fn commit(&self, uncommitted: UncommittedEventStream) -> Result<CommittedEventStream, StoreError> {
        let event_source = uncommitted.source.event_source;
        if uncommitted.events.is_empty() {
            return Err(StoreError::EmptyCommit(event_source));
        }

        // Check and append under one write lock
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.commit_ids.contains(&uncommitted.id) {
            return Err(StoreError::DuplicateCommit(uncommitted.id));
        }

        let current = state
            .versions
            .get(&event_source)
            .copied()
            .unwrap_or_else(EventSourceVersion::initial);
        let expected = current.next_commit();
        let actual = uncommitted.source.version;
        if actual != expected {
            return Err(StoreError::VersionConflict {
                event_source,
                expected,
                actual,
            });
        }

        let sequence = CommitSequenceNumber::from(self.sequence_numbers.next()?);
        let last_sequence = (uncommitted.events.len() - 1) as u32;

        let committed = CommittedEventStream {
            sequence,
            source: uncommitted.source,
            id: uncommitted.id,
            correlation_id: uncommitted.correlation_id,
            timestamp: uncommitted.timestamp,
            events: uncommitted.events,
        };

        let version = EventSourceVersion::new(actual.commit, last_sequence);
        state.versions.insert(event_source, version);
        state.commit_ids.insert(committed.id);
        state.log.push(committed.clone());

        tracing::debug!(
            "Committed {} events to {} at {:?} (commit sequence {})",
            committed.events.len(),
            event_source,
            version,
            sequence.0
        );

        Ok(committed)
    }
}

impl<S: EventSequenceNumbers> CommitHistory for InMemoryEventStore<S> {
    fn commits_after(&self, offset: Option<CommitSequenceNumber>) -> Result<Vec<CommittedEventStream>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let start = match offset {
            Some(offset) => state.log.partition_point(|committed| committed.sequence <= offset),
            None => 0,
        };
        Ok(state.log[start..].to_vec())
    }
}
