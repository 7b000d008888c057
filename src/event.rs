// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Envelopes and streams of events.
//!
//! Nothing in here is mutated after construction. Re-stamping an event for a
//! different store produces a new `EventMetadata`, it never edits one.

use crate::types::artifact::Artifact;
use crate::types::id::{Application, BoundedContext, CommitId, CorrelationId, EventId};
use crate::version::{CommitSequenceNumber, VersionedEventSource};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

/// Where an event was originally produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginalContext {
    pub application: Application,
    pub bounded_context: BoundedContext,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: EventId,
    pub versioned_event_source: VersionedEventSource,
    pub correlation_id: CorrelationId,
    pub artifact: Artifact,
    pub caused_by: OriginalContext,
    pub occurred: Timestamp,
}

impl EventMetadata {
    /// Copy of this metadata stamped for a different versioned event source.
    pub fn restamped(&self, versioned_event_source: VersionedEventSource) -> Self {
        Self {
            event_id: self.event_id,
            versioned_event_source,
            correlation_id: self.correlation_id,
            artifact: self.artifact,
            caused_by: self.caused_by,
            occurred: self.occurred,
        }
    }
}

/// Opaque, already-serialized event content.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(pub Vec<u8>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub metadata: EventMetadata,
    pub event: EventPayload,
}

/// Events in the order they were produced.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventStream(Vec<EventEnvelope>);

impl EventStream {
    pub fn new(events: Vec<EventEnvelope>) -> Self {
        Self(events)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, EventEnvelope> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&EventEnvelope> {
        self.0.last()
    }

    pub fn into_inner(self) -> Vec<EventEnvelope> {
        self.0
    }
}

impl From<Vec<EventEnvelope>> for EventStream {
    fn from(events: Vec<EventEnvelope>) -> Self {
        Self(events)
    }
}

impl IntoIterator for EventStream {
    type Item = EventEnvelope;
    type IntoIter = alloc::vec::IntoIter<EventEnvelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a EventEnvelope;
    type IntoIter = core::slice::Iter<'a, EventEnvelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A batch appended atomically to a store, as that store numbered it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedEventStream {
    pub sequence: CommitSequenceNumber,
    pub source: VersionedEventSource,
    pub id: CommitId,
    pub correlation_id: CorrelationId,
    pub timestamp: Timestamp,
    pub events: EventStream,
}

impl CommittedEventStream {
    /// True when the stream has events and every one of them was produced in
    /// `context`. Streams replicated from elsewhere keep their remote origin.
    pub fn originated_in(&self, context: &OriginalContext) -> bool {
        !self.events.is_empty()
            && self
                .events
                .iter()
                .all(|envelope| envelope.metadata.caused_by == *context)
    }
}

/// A batch about to be appended; `source.version` is the version the store
/// is expected to assign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEventStream {
    pub id: CommitId,
    pub correlation_id: CorrelationId,
    pub source: VersionedEventSource,
    pub timestamp: Timestamp,
    pub events: EventStream,
}
