// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Version arithmetic over (commit, sequence) pairs.
//!
//! An `EventSourceVersion` is the position of an event inside the history of
//! one event source: the commit it belongs to and its sequence within that
//! commit. Sequences restart at 0 with every new commit.
//!
//! # Invariants
//! - `increment_sequence` never changes the commit
//! - `next_commit` always resets the sequence to 0
//! - Ordering is lexicographic: commit first, then sequence

use crate::types::artifact::Artifact;
use crate::types::id::EventSourceId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EventSourceVersion {
    pub commit: u64,
    pub sequence: u32,
}

impl EventSourceVersion {
    /// Version of an event source that has never been committed to.
    pub const fn initial() -> Self {
        Self {
            commit: 0,
            sequence: 0,
        }
    }

    pub const fn new(commit: u64, sequence: u32) -> Self {
        Self { commit, sequence }
    }

    /// `(commit, sequence + 1)`
    pub fn increment_sequence(&self) -> Self {
        Self {
            commit: self.commit,
            sequence: self.sequence + 1,
        }
    }

    /// `(commit + 1, 0)`
    pub fn next_commit(&self) -> Self {
        Self {
            commit: self.commit + 1,
            sequence: 0,
        }
    }

    pub fn is_initial(&self) -> bool {
        *self == Self::initial()
    }
}

/// An event source pinned to a version, together with the artifact that
/// describes the source's type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedEventSource {
    pub version: EventSourceVersion,
    pub event_source: EventSourceId,
    pub artifact: Artifact,
}

impl VersionedEventSource {
    pub fn new(version: EventSourceVersion, event_source: EventSourceId, artifact: Artifact) -> Self {
        Self {
            version,
            event_source,
            artifact,
        }
    }

    /// Same source and artifact, different version.
    pub fn at(&self, version: EventSourceVersion) -> Self {
        Self {
            version,
            event_source: self.event_source,
            artifact: self.artifact,
        }
    }
}

/// Value handed out by a sequence counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EventSequenceNumber(pub u64);

/// Store-wide position of a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct CommitSequenceNumber(pub u64);

impl From<EventSequenceNumber> for CommitSequenceNumber {
    fn from(value: EventSequenceNumber) -> Self {
        CommitSequenceNumber(value.0)
    }
}
