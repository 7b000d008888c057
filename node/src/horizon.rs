// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Producer side of an event horizon.
//!
//! Streams committed locally are passed to the `EventHorizon`, which
//! broadcasts them to all connected tunnels. Each tunnel is represented by a
//! `Singularity` holding its subscription and offset. A stream goes through a
//! singularity whole when at least one of its events is subscribed to.
//!
//! Only streams that originated in the horizon's own application and bounded
//! context leave through it. Replicated streams stay where they landed, so
//! two nodes subscribing to each other never bounce a commit back and forth.
//!
//! On connect a tunnel is first caught up from the commit history after its
//! offset, then receives live streams.

use crate::processing::{EventProcessors, ProcessingError};
use crate::store::{CommitHistory, StoreError};
use crate::telemetry::{NOT_LOCAL_TOTAL, PASSED_THROUGH_TOTAL};
use horizon_kernel::config::HORIZON_CHANNEL_CAPACITY;
use horizon_kernel::{
    Application, Artifact, BoundedContext, CommitSequenceNumber, CommittedEventStream, OpenTunnel,
    OriginalContext, TunnelClientId,
};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// One connected tunnel as seen from the horizon.
#[derive(Debug, Clone)]
pub struct Singularity {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub client_id: TunnelClientId,
    pub subscription: FxHashSet<Artifact>,
    /// Highest commit sequence the tunnel has, from its handshake.
    pub offset: Option<CommitSequenceNumber>,
}

impl Singularity {
    pub fn from_handshake(handshake: &OpenTunnel) -> Self {
        Self {
            application: handshake.application,
            bounded_context: handshake.bounded_context,
            client_id: handshake.client_id,
            subscription: handshake.events.iter().copied().collect(),
            offset: handshake.offset,
        }
    }

    pub fn can_pass_through(&self, stream: &CommittedEventStream) -> bool {
        stream
            .events
            .iter()
            .any(|envelope| self.subscription.contains(&envelope.metadata.artifact))
    }

    /// Whether `stream` is subscribed to and newer than anything the tunnel
    /// already has.
    fn wants(&self, stream: &CommittedEventStream) -> bool {
        self.offset.map_or(true, |offset| stream.sequence > offset) && self.can_pass_through(stream)
    }
}

/// A tunnel accepted by the horizon: its backlog, then the live receiver.
pub struct Collapsed {
    pub singularity: Singularity,
    pub backlog: Vec<Arc<CommittedEventStream>>,
    pub live: broadcast::Receiver<Arc<CommittedEventStream>>,
}

pub struct EventHorizon {
    origin: OriginalContext,
    sender: broadcast::Sender<Arc<CommittedEventStream>>,
    history: Option<Arc<dyn CommitHistory>>,
}

impl EventHorizon {
    /// A horizon without history: tunnels only receive live streams.
    pub fn new(application: Application, bounded_context: BoundedContext) -> Self {
        let (sender, _) = broadcast::channel(HORIZON_CHANNEL_CAPACITY);
        Self {
            origin: OriginalContext {
                application,
                bounded_context,
            },
            sender,
            history: None,
        }
    }

    /// A horizon catching tunnels up from `history` when they connect.
    pub fn with_history(
        application: Application,
        bounded_context: BoundedContext,
        history: Arc<dyn CommitHistory>,
    ) -> Self {
        Self {
            history: Some(history),
            ..Self::new(application, bounded_context)
        }
    }

    pub fn application(&self) -> Application {
        self.origin.application
    }

    pub fn bounded_context(&self) -> BoundedContext {
        self.origin.bounded_context
    }

    /// Number of tunnels currently connected.
    pub fn singularities(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Offer a committed stream to every connected tunnel. Returns how many
    /// tunnels were connected, 0 for a stream that did not originate here.
    pub fn pass_through(&self, stream: CommittedEventStream) -> usize {
        if !stream.originated_in(&self.origin) {
            metrics::counter!(NOT_LOCAL_TOTAL, 1);
            tracing::debug!("Horizon: commit {} originated elsewhere, not passed through", stream.id);
            return 0;
        }

        match self.sender.send(Arc::new(stream)) {
            Ok(receivers) => receivers,
            // No tunnel connected
            Err(_) => 0,
        }
    }

    /// Accept a tunnel. The live receiver is subscribed before the history is
    /// read, so nothing committed in between is missed.
    pub fn collapse_into(&self, handshake: &OpenTunnel) -> Result<Collapsed, StoreError> {
        let singularity = Singularity::from_handshake(handshake);
        let live = self.sender.subscribe();

        let backlog = match &self.history {
            Some(history) => history
                .commits_after(singularity.offset)?
                .into_iter()
                .filter(|stream| stream.originated_in(&self.origin) && singularity.can_pass_through(stream))
                .map(Arc::new)
                .collect(),
            None => Vec::new(),
        };

        tracing::info!(
            "Singularity collapsed for {}/{} as client {} ({} artifacts, offset {:?}, {} to catch up)",
            singularity.application,
            singularity.bounded_context,
            singularity.client_id,
            singularity.subscription.len(),
            singularity.offset,
            backlog.len()
        );
        Ok(Collapsed {
            singularity,
            backlog,
            live,
        })
    }
}

impl EventProcessors for EventHorizon {
    fn process(&self, committed: &CommittedEventStream) -> Result<(), ProcessingError> {
        self.pass_through(committed.clone());
        Ok(())
    }
}

fn encode(singularity: &Singularity, stream: &CommittedEventStream) -> Option<String> {
    match serde_json::to_string(stream) {
        Ok(json) => Some(json + "\n"),
        Err(e) => {
            tracing::error!("Singularity {}: encode failed: {}", singularity.client_id, e);
            None
        }
    }
}

/// Forward the backlog, then every live stream the singularity lets through,
/// as JSON lines until the receiving side goes away or the horizon is dropped.
/// Live streams already sent as part of the backlog are skipped.
pub fn spawn_singularity_stream(collapsed: Collapsed) -> mpsc::Receiver<Result<String, std::io::Error>> {
    let (tx, rx) = mpsc::channel(100);
    let Collapsed {
        mut singularity,
        backlog,
        mut live,
    } = collapsed;

    tokio::spawn(async move {
        for stream in backlog {
            if !singularity.wants(&stream) {
                continue;
            }
            let Some(line) = encode(&singularity, &stream) else {
                continue;
            };
            if tx.send(Ok(line)).await.is_err() {
                return;
            }
            singularity.offset = Some(stream.sequence);
            metrics::counter!(PASSED_THROUGH_TOTAL, 1);
        }

        loop {
            let received = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Singularity {}: tunnel disconnected", singularity.client_id);
                    return;
                }
                received = live.recv() => received,
            };

            match received {
                Ok(stream) => {
                    if !singularity.wants(&stream) {
                        continue;
                    }
                    let Some(line) = encode(&singularity, &stream) else {
                        continue;
                    };
                    if tx.send(Ok(line)).await.is_err() {
                        return;
                    }
                    metrics::counter!(PASSED_THROUGH_TOTAL, 1);
                    tracing::debug!(
                        "Singularity {}: passed through commit {}",
                        singularity.client_id,
                        stream.id
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Singularity {}: lagging, skipped {} commits",
                        singularity.client_id,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_kernel::{
        ArtifactId, CommitId, CorrelationId, EventEnvelope, EventId, EventMetadata, EventPayload,
        EventSourceId, EventSourceVersion, EventStream, Timestamp, VersionedEventSource,
    };

    const APP: Application = Application::from_u128(1);
    const BC: BoundedContext = BoundedContext::from_u128(2);

    fn artifact(n: u128) -> Artifact {
        Artifact::first_generation(ArtifactId::from_u128(n))
    }

    /// Stream committed here at sequence `id`.
    fn stream(id: u128, artifacts: &[Artifact]) -> CommittedEventStream {
        let source = VersionedEventSource::new(
            EventSourceVersion::new(1, 0),
            EventSourceId::from_u128(7),
            artifact(0x70),
        );
        let events = artifacts
            .iter()
            .enumerate()
            .map(|(i, a)| EventEnvelope {
                id: EventId::from_u128(i as u128),
                metadata: EventMetadata {
                    event_id: EventId::from_u128(i as u128),
                    versioned_event_source: source.at(EventSourceVersion::new(1, i as u32)),
                    correlation_id: CorrelationId::from_u128(1),
                    artifact: *a,
                    caused_by: OriginalContext {
                        application: APP,
                        bounded_context: BC,
                    },
                    occurred: Timestamp(0),
                },
                event: EventPayload(vec![1, 2, 3]),
            })
            .collect::<Vec<_>>();

        CommittedEventStream {
            sequence: CommitSequenceNumber(id as u64),
            source,
            id: CommitId::from_u128(id),
            correlation_id: CorrelationId::from_u128(1),
            timestamp: Timestamp(0),
            events: EventStream::new(events),
        }
    }

    /// Stream replicated into this store from another application.
    fn replicated(id: u128, artifacts: &[Artifact]) -> CommittedEventStream {
        let mut stream = stream(id, artifacts);
        let mut events: Vec<_> = stream.events.iter().cloned().collect();
        for envelope in &mut events {
            envelope.metadata.caused_by.application = Application::from_u128(99);
        }
        stream.events = EventStream::new(events);
        stream
    }

    fn handshake(events: Vec<Artifact>, offset: Option<u64>) -> OpenTunnel {
        OpenTunnel {
            application: Application::from_u128(20),
            bounded_context: BoundedContext::from_u128(21),
            client_id: TunnelClientId::from_u128(22),
            events,
            offset: offset.map(CommitSequenceNumber),
        }
    }

    struct History(Vec<CommittedEventStream>);

    impl CommitHistory for History {
        fn commits_after(&self, offset: Option<CommitSequenceNumber>) -> Result<Vec<CommittedEventStream>, StoreError> {
            Ok(self
                .0
                .iter()
                .filter(|c| offset.map_or(true, |o| c.sequence > o))
                .cloned()
                .collect())
        }
    }

    fn decode(line: String) -> CommittedEventStream {
        assert!(line.ends_with('\n'));
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn test_whole_stream_passes_when_one_event_is_subscribed() {
        let singularity = Singularity::from_handshake(&handshake(vec![artifact(2)], None));

        assert!(singularity.can_pass_through(&stream(1, &[artifact(1), artifact(2)])));
        assert!(!singularity.can_pass_through(&stream(2, &[artifact(1), artifact(3)])));
        assert!(!singularity.can_pass_through(&stream(3, &[])));
    }

    #[test]
    fn test_pass_through_without_tunnels() {
        let horizon = EventHorizon::new(APP, BC);
        assert_eq!(horizon.singularities(), 0);
        assert_eq!(horizon.pass_through(stream(1, &[artifact(1)])), 0);
    }

    #[test]
    fn test_replicated_streams_stay_local() {
        let horizon = EventHorizon::new(APP, BC);
        let _tunnel = horizon.collapse_into(&handshake(vec![artifact(1)], None)).unwrap();

        assert_eq!(horizon.pass_through(replicated(1, &[artifact(1)])), 0);
        assert_eq!(horizon.pass_through(stream(2, &[artifact(1)])), 1);
    }

    #[tokio::test]
    async fn test_singularity_stream_filters() {
        let horizon = EventHorizon::new(APP, BC);
        let collapsed = horizon.collapse_into(&handshake(vec![artifact(2)], None)).unwrap();
        assert!(collapsed.backlog.is_empty());
        assert_eq!(horizon.singularities(), 1);

        let mut lines = spawn_singularity_stream(collapsed);

        horizon.process(&stream(1, &[artifact(1)])).unwrap();
        horizon.process(&replicated(2, &[artifact(2)])).unwrap();
        horizon.process(&stream(3, &[artifact(1), artifact(2)])).unwrap();
        drop(horizon);

        let decoded = decode(lines.recv().await.unwrap().unwrap());
        assert_eq!(decoded.id, CommitId::from_u128(3));
        assert_eq!(decoded.events.len(), 2);

        // Horizon dropped, stream ends
        assert!(lines.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_tunnel_is_caught_up_after_its_offset() {
        let history = History(vec![
            stream(1, &[artifact(1)]),
            stream(2, &[artifact(1)]),
            replicated(3, &[artifact(1)]),
            stream(4, &[artifact(5)]),
            stream(5, &[artifact(1)]),
        ]);
        let horizon = EventHorizon::with_history(APP, BC, Arc::new(history));

        let collapsed = horizon.collapse_into(&handshake(vec![artifact(1)], Some(1))).unwrap();
        let backlog: Vec<_> = collapsed.backlog.iter().map(|c| c.sequence.0).collect();
        assert_eq!(backlog, vec![2, 5]);

        let mut lines = spawn_singularity_stream(collapsed);

        // Already part of the backlog
        horizon.pass_through(stream(5, &[artifact(1)]));
        horizon.pass_through(stream(6, &[artifact(1)]));
        drop(horizon);

        let mut received = Vec::new();
        while let Some(line) = lines.recv().await {
            received.push(decode(line.unwrap()).sequence.0);
        }
        assert_eq!(received, vec![2, 5, 6]);
    }
}
