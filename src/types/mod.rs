//! Identity types.

pub mod id;
pub mod artifact;
pub mod resource;
