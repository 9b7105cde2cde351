//! Artifact scanning: discovery, candidate naming, and the scan coordinator.

pub mod candidate;
pub mod coordinator;
pub mod walker;
