// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Moving committed streams across an event horizon.
//!
//! A stream committed by a remote application carries the remote store's
//! numbering. Before it can be appended locally it is re-versioned against
//! the local store:
//!
//! ```text
//! last known local version (c, s)
//! ↓
//! new commit version       (c + 1, 0)
//! ↓
//! event i                  (c + 1, i)     for i in 0..k, in stream order
//! ```
//!
//! However many commits the batch represented at the origin, it becomes
//! exactly one local commit with gap-free sequences.

use crate::event::{CommittedEventStream, EventEnvelope, EventStream, UncommittedEventStream};
use crate::types::artifact::Artifact;
use crate::types::id::{Application, BoundedContext, TunnelClientId};
use crate::version::{CommitSequenceNumber, EventSourceVersion};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Handshake sent by a tunnel when it opens a stream towards a horizon.
///
/// `offset` is the highest commit sequence the tunnel has received from this
/// horizon so far. The horizon replays what it committed after it before
/// going live; `None` asks for everything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTunnel {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub client_id: TunnelClientId,
    pub events: Vec<Artifact>,
    #[serde(default)]
    pub offset: Option<CommitSequenceNumber>,
}

impl OpenTunnel {
    pub fn subscribes_to(&self, artifact: &Artifact) -> bool {
        self.events.contains(artifact)
    }
}

/// Re-version a remotely committed stream so it can be appended after
/// `last_known` in the local store.
///
/// Commit id, correlation id and timestamp of the batch are preserved, as are
/// id, correlation id, artifact, original context and occurrence time of
/// every event.
pub fn into_local_commit(
    committed: CommittedEventStream,
    last_known: EventSourceVersion,
) -> UncommittedEventStream {
    let commit_version = last_known.next_commit();
    let source = committed.source.at(commit_version);

    let mut version = commit_version;
    let mut envelopes = Vec::with_capacity(committed.events.len());
    for envelope in committed.events {
        envelopes.push(EventEnvelope {
            id: envelope.id,
            metadata: envelope.metadata.restamped(source.at(version)),
            event: envelope.event,
        });
        version = version.increment_sequence();
    }

    UncommittedEventStream {
        id: committed.id,
        correlation_id: committed.correlation_id,
        source,
        timestamp: committed.timestamp,
        events: EventStream::new(envelopes),
    }
}
