//! Artifacts identify the logical type and shape of an event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ArtifactGeneration(pub u32);

impl ArtifactGeneration {
    pub const FIRST: ArtifactGeneration = ArtifactGeneration(1);

    pub fn next(&self) -> Self {
        ArtifactGeneration(self.0 + 1)
    }
}

impl Default for ArtifactGeneration {
    fn default() -> Self {
        Self::FIRST
    }
}

/// An artifact is immutable: a changed shape is a new generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub generation: ArtifactGeneration,
}

impl Artifact {
    pub fn new(id: ArtifactId, generation: ArtifactGeneration) -> Self {
        Self { id, generation }
    }

    pub fn first_generation(id: ArtifactId) -> Self {
        Self::new(id, ArtifactGeneration::FIRST)
    }
}
