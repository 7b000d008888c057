// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! UUID-backed identities.
//!
//! Every identity is an immutable `Copy` newtype so that an `EventId` can never
//! be handed where a `CommitId` is expected.

use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_identity!(
    /// A deployed application.
    Application
);
uuid_identity!(
    /// A logical domain inside an application.
    BoundedContext
);
uuid_identity!(
    /// The entity whose history forms one ordered stream of events.
    EventSourceId
);
uuid_identity!(EventId);
uuid_identity!(CommitId);
uuid_identity!(CorrelationId);
uuid_identity!(
    /// Identifies one connection attempt of a tunnel; fresh per handshake.
    TunnelClientId
);
