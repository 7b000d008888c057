#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::StreamExt;
use horizon_kernel::{
    into_local_commit, Application, Artifact, ArtifactId, BoundedContext, CommitId,
    CommitSequenceNumber, CommittedEventStream, CorrelationId, EventEnvelope, EventId,
    EventMetadata, EventPayload, EventSourceId, EventSourceVersion, EventStream, OpenTunnel,
    OriginalContext, Timestamp, VersionedEventSource,
};
use horizon_node::config::EventHorizonConfiguration;
use horizon_node::network::{CommitStream, HorizonTransport, TransportError};
use horizon_node::store::{EventStore, InMemoryEventStore};
use horizon_node::tunnel::TunnelSettings;
use horizon_persistence::{EventSequenceNumbers, MemoryFiles, SequenceGenerator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const REMOTE_APP: Application = Application::from_u128(0xA0);
pub const REMOTE_BC: BoundedContext = BoundedContext::from_u128(0xB0);
pub const LOCAL_APP: Application = Application::from_u128(0xA1);
pub const LOCAL_BC: BoundedContext = BoundedContext::from_u128(0xB1);

pub fn artifact(n: u128) -> Artifact {
    Artifact::first_generation(ArtifactId::from_u128(n))
}

pub fn source_artifact() -> Artifact {
    artifact(0x5000)
}

/// A stream as committed by the remote store at `remote_commit`, one event
/// per artifact.
pub fn remote_commit(
    event_source: EventSourceId,
    commit_id: u128,
    remote_commit: u64,
    artifacts: &[Artifact],
) -> CommittedEventStream {
    let source = VersionedEventSource::new(
        EventSourceVersion::new(remote_commit, 0),
        event_source,
        source_artifact(),
    );
    let events = artifacts
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let id = EventId::from_u128(commit_id * 1000 + i as u128);
            EventEnvelope {
                id,
                metadata: EventMetadata {
                    event_id: id,
                    versioned_event_source: source.at(EventSourceVersion::new(remote_commit, i as u32)),
                    correlation_id: CorrelationId::from_u128(commit_id),
                    artifact: *a,
                    caused_by: OriginalContext {
                        application: REMOTE_APP,
                        bounded_context: REMOTE_BC,
                    },
                    occurred: Timestamp(1_700_000_000_000 + i as u64),
                },
                event: EventPayload(vec![i as u8; 4]),
            }
        })
        .collect::<Vec<_>>();

    CommittedEventStream {
        sequence: CommitSequenceNumber(remote_commit),
        source,
        id: CommitId::from_u128(commit_id),
        correlation_id: CorrelationId::from_u128(commit_id),
        timestamp: Timestamp(1_700_000_000_000),
        events: EventStream::new(events),
    }
}

/// Commit a stream produced in `origin` to `store`, the way a local writer
/// would.
pub fn commit_locally<S: EventSequenceNumbers>(
    store: &InMemoryEventStore<S>,
    origin: OriginalContext,
    event_source: EventSourceId,
    commit_id: u128,
    artifacts: &[Artifact],
) -> CommittedEventStream {
    let mut stream = remote_commit(event_source, commit_id, 1, artifacts);
    let events: Vec<_> = stream
        .events
        .iter()
        .cloned()
        .map(|mut envelope| {
            envelope.metadata.caused_by = origin;
            envelope
        })
        .collect();
    stream.events = EventStream::new(events);

    let last = store.version_for(event_source).unwrap();
    store.commit(into_local_commit(stream, last)).unwrap()
}

pub fn memory_store() -> InMemoryEventStore<SequenceGenerator<MemoryFiles>> {
    InMemoryEventStore::new(SequenceGenerator::new(MemoryFiles::new(), "test-sequences").unwrap())
}

pub fn settings(url: &str, events: Vec<Artifact>, backoff: Duration) -> TunnelSettings {
    let horizon = EventHorizonConfiguration {
        application: REMOTE_APP,
        bounded_context: REMOTE_BC,
        url: url.to_string(),
        events,
    };
    TunnelSettings::new(LOCAL_APP, LOCAL_BC, &horizon).with_backoff(backoff)
}

pub enum Connection {
    /// `open` fails.
    Refuse,
    /// Delivers the batches, then the stream ends.
    Deliver(Vec<CommittedEventStream>),
    /// Delivers the batches, then stays open.
    Hold(Vec<CommittedEventStream>),
}

/// Transport answering each `open` with the next scripted connection. Once
/// the script runs out every connection is held open without batches.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Connection>>,
    handshakes: Mutex<Vec<OpenTunnel>>,
    opened_at: Mutex<Vec<Instant>>,
    shutdowns: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Connection>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.handshakes.lock().unwrap().len()
    }

    pub fn handshakes(&self) -> Vec<OpenTunnel> {
        self.handshakes.lock().unwrap().clone()
    }

    pub fn opened_at(&self) -> Vec<Instant> {
        self.opened_at.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl HorizonTransport for ScriptedTransport {
    fn open(&self, handshake: OpenTunnel) -> BoxFuture<'_, Result<CommitStream, TransportError>> {
        self.opened_at.lock().unwrap().push(Instant::now());
        self.handshakes.lock().unwrap().push(handshake);

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Connection::Hold(Vec::new()));

        let result: Result<CommitStream, TransportError> = match next {
            Connection::Refuse => Err(TransportError::Network("connection refused".to_string())),
            Connection::Deliver(batches) => Ok(futures::stream::iter(batches.into_iter().map(Ok)).boxed()),
            Connection::Hold(batches) => Ok(futures::stream::iter(batches.into_iter().map(Ok))
                .chain(futures::stream::pending())
                .boxed()),
        };
        Box::pin(async move { result })
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds, failing the test after `limit`.
pub async fn wait_until<F: Fn() -> bool>(limit: Duration, condition: F) {
    let deadline = Instant::now() + limit;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
