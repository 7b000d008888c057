// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Application resource identity.
//!
//! An `ApplicationResourceIdentifier` names a resource within a specific
//! application and bounded context. Its `Display` output is the stable string
//! form used to derive durable names (for example per-source sequence
//! counters), so it must never change for a given identifier:
//!
//! ```text
//! <application>.<bounded_context>.<resource type>.<resource>
//! ```
//!
//! All UUID segments render hyphenated and lowercase, which keeps the form
//! safe to use as a file name.

use crate::types::id::{Application, BoundedContext, EventSourceId};
use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApplicationResourceType {
    EventSource,
    Event,
}

impl ApplicationResourceType {
    pub fn identifier(&self) -> &'static str {
        match self {
            ApplicationResourceType::EventSource => "EventSource",
            ApplicationResourceType::Event => "Event",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationResourceIdentifier {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub resource_type: ApplicationResourceType,
    pub resource: Uuid,
}

impl ApplicationResourceIdentifier {
    pub fn new(
        application: Application,
        bounded_context: BoundedContext,
        resource_type: ApplicationResourceType,
        resource: Uuid,
    ) -> Self {
        Self {
            application,
            bounded_context,
            resource_type,
            resource,
        }
    }

    pub fn for_event_source(
        application: Application,
        bounded_context: BoundedContext,
        event_source: EventSourceId,
    ) -> Self {
        Self::new(
            application,
            bounded_context,
            ApplicationResourceType::EventSource,
            event_source.0,
        )
    }
}

impl fmt::Display for ApplicationResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.application,
            self.bounded_context,
            self.resource_type.identifier(),
            self.resource
        )
    }
}
