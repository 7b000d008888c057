// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! horizon-kernel: value types and version arithmetic for replicating committed
//! event streams across an event horizon.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod types;
pub mod version;
pub mod event;
pub mod relativity;


pub use event::{
    CommittedEventStream, EventEnvelope, EventMetadata, EventPayload, EventStream,
    OriginalContext, Timestamp, UncommittedEventStream,
};
pub use relativity::{into_local_commit, OpenTunnel};
pub use types::artifact::{Artifact, ArtifactGeneration, ArtifactId};
pub use types::id::{
    Application, BoundedContext, CommitId, CorrelationId, EventId, EventSourceId, TunnelClientId,
};
pub use types::resource::{ApplicationResourceIdentifier, ApplicationResourceType};
pub use version::{
    CommitSequenceNumber, EventSequenceNumber, EventSourceVersion, VersionedEventSource,
};
