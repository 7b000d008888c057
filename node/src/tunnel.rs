// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Consumer side of an event horizon.
//!
//! A tunnel keeps one connection to a remote horizon open, re-versions every
//! committed stream it receives against the local store, commits it and hands
//! it to the local processors.
//!
//! ```text
//! Connecting ──ok──▶ Streaming ──error / end──▶ BackingOff ──sleep──▶ Connecting
//!      └──────────────failed───────────────────────▲
//! any state ──cancel──▶ Closed
//! ```
//!
//! Batches are handled strictly one after another. A batch that fails is
//! logged, counted and dropped; it never breaks the connection. Empty batches
//! and commits the store already holds are counted as skipped.
//!
//! The highest commit sequence received is sent with every handshake, so the
//! horizon can replay what was committed while the tunnel was away.

use crate::config::{EventHorizonConfiguration, NodeConfig};
use crate::network::{HorizonTransport, TransportError};
use crate::processing::{EventProcessors, ProcessingError};
use crate::store::{EventStore, StoreError};
use crate::telemetry::{
    BATCHES_COMMITTED_TOTAL, BATCHES_DROPPED_TOTAL, BATCHES_SKIPPED_TOTAL, CONNECTS_TOTAL,
};
use futures::StreamExt;
use horizon_kernel::config::RECONNECT_BACKOFF_MILLIS;
use horizon_kernel::{
    into_local_commit, Application, Artifact, BoundedContext, CommitSequenceNumber,
    CommittedEventStream, OpenTunnel, TunnelClientId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Batch handling aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub horizon_application: Application,
    pub horizon_bounded_context: BoundedContext,
    pub url: String,
    pub events: Vec<Artifact>,
    pub backoff: Duration,
}

impl TunnelSettings {
    pub fn new(
        application: Application,
        bounded_context: BoundedContext,
        horizon: &EventHorizonConfiguration,
    ) -> Self {
        Self {
            application,
            bounded_context,
            horizon_application: horizon.application,
            horizon_bounded_context: horizon.bounded_context,
            url: horizon.url.clone(),
            events: horizon.events.clone(),
            backoff: Duration::from_millis(RECONNECT_BACKOFF_MILLIS),
        }
    }

    pub fn for_horizon(config: &NodeConfig, horizon: &EventHorizonConfiguration) -> Self {
        Self {
            backoff: config.reconnect_backoff,
            ..Self::new(config.application, config.bounded_context, horizon)
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Counters of one tunnel, shared between the run loop and its handle.
#[derive(Debug, Default)]
pub struct TunnelStats {
    connects: AtomicU64,
    batches_committed: AtomicU64,
    batches_dropped: AtomicU64,
    batches_skipped: AtomicU64,
    /// 0 until the first batch arrives; commit sequences start at 1.
    last_received: AtomicU64,
}

impl TunnelStats {
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed.load(Ordering::Relaxed)
    }

    pub fn batches_dropped(&self) -> u64 {
        self.batches_dropped.load(Ordering::Relaxed)
    }

    pub fn batches_skipped(&self) -> u64 {
        self.batches_skipped.load(Ordering::Relaxed)
    }

    /// Highest remote commit sequence received, whatever became of the batch.
    pub fn last_received(&self) -> Option<CommitSequenceNumber> {
        match self.last_received.load(Ordering::Relaxed) {
            0 => None,
            sequence => Some(CommitSequenceNumber(sequence)),
        }
    }
}

pub struct EventHorizonTunnel {
    settings: TunnelSettings,
    store: Arc<dyn EventStore>,
    processors: Arc<dyn EventProcessors>,
    transport: Arc<dyn HorizonTransport>,
    stats: Arc<TunnelStats>,
}

impl EventHorizonTunnel {
    pub fn new(
        settings: TunnelSettings,
        store: Arc<dyn EventStore>,
        processors: Arc<dyn EventProcessors>,
        transport: Arc<dyn HorizonTransport>,
    ) -> Self {
        Self {
            settings,
            store,
            processors,
            transport,
            stats: Arc::new(TunnelStats::default()),
        }
    }

    pub fn settings(&self) -> &TunnelSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<TunnelStats> {
        self.stats.clone()
    }

    /// Handshake for one connection attempt. The client id is fresh every time.
    pub fn handshake(&self) -> OpenTunnel {
        OpenTunnel {
            application: self.settings.application,
            bounded_context: self.settings.bounded_context,
            client_id: TunnelClientId::from(Uuid::new_v4()),
            events: self.settings.events.clone(),
            offset: self.stats.last_received(),
        }
    }

    /// Re-version `committed` after the local version of its event source,
    /// commit it and run the processors.
    pub fn handle_batch(&self, committed: CommittedEventStream) -> Result<CommittedEventStream, BatchError> {
        apply_batch(self.store.as_ref(), self.processors.as_ref(), committed)
    }

    fn skip(&self) {
        self.stats.batches_skipped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(BATCHES_SKIPPED_TOTAL, 1);
    }

    async fn receive(&self, committed: CommittedEventStream) {
        self.stats
            .last_received
            .fetch_max(committed.sequence.0, Ordering::Relaxed);

        if committed.events.is_empty() {
            self.skip();
            tracing::warn!("Tunnel: skipping empty commit {} from {}", committed.id, self.settings.url);
            return;
        }

        let commit_id = committed.id;
        let event_source = committed.source.event_source;
        let store = self.store.clone();
        let processors = self.processors.clone();

        // Committing persists a sequence number, keep it off the async workers
        let outcome = match tokio::task::spawn_blocking(move || {
            apply_batch(store.as_ref(), processors.as_ref(), committed)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => Err(BatchError::Aborted(e)),
        };

        match outcome {
            Err(BatchError::Store(StoreError::DuplicateCommit(_))) => {
                self.skip();
                tracing::debug!("Tunnel: commit {} is already stored, skipping", commit_id);
            }
            Ok(local) => {
                self.stats.batches_committed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(BATCHES_COMMITTED_TOTAL, 1);
                tracing::info!(
                    "Tunnel: committed {} events from {} to {} at {:?}",
                    local.events.len(),
                    self.settings.url,
                    event_source,
                    local.source.version
                );
            }
            Err(e) => {
                self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(BATCHES_DROPPED_TOTAL, 1);
                tracing::error!(
                    "Tunnel: dropping commit {} for event source {}: {}",
                    commit_id,
                    event_source,
                    e
                );
            }
        }
    }

    /// Run until `cancel` fires. Remote failures only ever lead to a reconnect.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Tunnel: opening towards {} ({}/{})",
            self.settings.url,
            self.settings.horizon_application,
            self.settings.horizon_bounded_context
        );

        'run: loop {
            if cancel.is_cancelled() {
                break;
            }

            let handshake = self.handshake();
            let client_id = handshake.client_id;
            self.stats.connects.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(CONNECTS_TOTAL, 1);

            let opened = tokio::select! {
                _ = cancel.cancelled() => break 'run,
                opened = self.transport.open(handshake) => opened,
            };

            match opened {
                Ok(mut stream) => {
                    tracing::info!("Tunnel: connected to {} as {}", self.settings.url, client_id);
                    loop {
                        let next = tokio::select! {
                            _ = cancel.cancelled() => break 'run,
                            next = stream.next() => next,
                        };
                        match next {
                            Some(Ok(committed)) => self.receive(committed).await,
                            Some(Err(e)) => {
                                tracing::warn!("Tunnel: connection to {} broke: {}", self.settings.url, e);
                                break;
                            }
                            None => {
                                tracing::warn!("Tunnel: stream from {} ended", self.settings.url);
                                break;
                            }
                        }
                    }
                }
                Err(TransportError::Closed) => break,
                Err(e) => {
                    tracing::warn!("Tunnel: failed to connect to {}: {}", self.settings.url, e);
                }
            }

            tracing::warn!("Tunnel: reconnecting to {} in {:?}", self.settings.url, self.settings.backoff);
            tokio::select! {
                _ = cancel.cancelled() => break 'run,
                _ = tokio::time::sleep(self.settings.backoff) => {}
            }
        }

        tracing::info!("Tunnel: closed towards {}", self.settings.url);
    }
}

fn apply_batch(
    store: &dyn EventStore,
    processors: &dyn EventProcessors,
    committed: CommittedEventStream,
) -> Result<CommittedEventStream, BatchError> {
    let last = store.version_for(committed.source.event_source)?;
    let uncommitted = into_local_commit(committed, last);
    let local = store.commit(uncommitted)?;
    processors.process(&local)?;
    Ok(local)
}
