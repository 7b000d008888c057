//! Event processors run after a stream has been committed locally.

use horizon_kernel::{Artifact, CommittedEventStream, EventEnvelope, EventId};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorFailure {
    pub processor: String,
    pub event_id: EventId,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("{0}")]
    Rejected(String),
    #[error("{} processor invocation(s) failed", .failures.len())]
    Failed { failures: Vec<ProcessorFailure> },
    #[error("Processor registry lock poisoned")]
    LockPoisoned,
}

/// Everything that wants to see a committed stream.
pub trait EventProcessors: Send + Sync {
    fn process(&self, committed: &CommittedEventStream) -> Result<(), ProcessingError>;
}

/// Handles single events of one artifact.
pub trait EventProcessor: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, envelope: &EventEnvelope, committed: &CommittedEventStream) -> Result<(), ProcessingError>;
}

/// Dispatches every event to the processors registered for its artifact.
///
/// A failing processor does not stop the others, failures are collected and
/// returned together.
#[derive(Default)]
pub struct ArtifactEventProcessors {
    processors: RwLock<FxHashMap<Artifact, Vec<Arc<dyn EventProcessor>>>>,
}

impl ArtifactEventProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, artifact: Artifact, processor: Arc<dyn EventProcessor>) -> Result<(), ProcessingError> {
        let mut processors = self.processors.write().map_err(|_| ProcessingError::LockPoisoned)?;
        tracing::debug!("Registering processor '{}' for artifact {:?}", processor.name(), artifact);
        processors.entry(artifact).or_default().push(processor);
        Ok(())
    }
}

impl EventProcessors for ArtifactEventProcessors {
    fn process(&self, committed: &CommittedEventStream) -> Result<(), ProcessingError> {
        let processors = self.processors.read().map_err(|_| ProcessingError::LockPoisoned)?;
        let mut failures = Vec::new();

        for envelope in &committed.events {
            let Some(registered) = processors.get(&envelope.metadata.artifact) else {
                continue;
            };
            for processor in registered {
                if let Err(e) = processor.process(envelope, committed) {
                    tracing::error!(
                        "Processor '{}' failed on event {}: {}",
                        processor.name(),
                        envelope.id,
                        e
                    );
                    failures.push(ProcessorFailure {
                        processor: processor.name().to_string(),
                        event_id: envelope.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessingError::Failed { failures })
        }
    }
}

/// Runs each stage in order, every stage sees the stream even if an earlier
/// one failed.
pub struct ChainedProcessors {
    stages: Vec<Arc<dyn EventProcessors>>,
}

impl ChainedProcessors {
    pub fn new(stages: Vec<Arc<dyn EventProcessors>>) -> Self {
        Self { stages }
    }
}

impl EventProcessors for ChainedProcessors {
    fn process(&self, committed: &CommittedEventStream) -> Result<(), ProcessingError> {
        let mut failures = Vec::new();
        for stage in &self.stages {
            match stage.process(committed) {
                Ok(()) => {}
                Err(ProcessingError::Failed { failures: more }) => failures.extend(more),
                Err(e) => failures.push(ProcessorFailure {
                    processor: "chain".to_string(),
                    event_id: committed.events.iter().next().map(|e| e.id).unwrap_or_default(),
                    reason: e.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessingError::Failed { failures })
        }
    }
}
