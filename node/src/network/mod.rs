pub mod client;

pub use client::HttpTransport;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use horizon_kernel::{CommittedEventStream, OpenTunnel};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Horizon refused the tunnel with status {0}")]
    Refused(u16),
    #[error("Transport has been shut down")]
    Closed,
}

/// Committed streams arriving from a remote horizon, in send order.
pub type CommitStream = BoxStream<'static, Result<CommittedEventStream, TransportError>>;

/// Connection to a remote event horizon.
pub trait HorizonTransport: Send + Sync {
    /// Send the handshake and start receiving committed streams.
    fn open(&self, handshake: OpenTunnel) -> BoxFuture<'_, Result<CommitStream, TransportError>>;

    /// Release the connection. Open streams end, later `open` calls fail.
    fn shutdown(&self);
}
