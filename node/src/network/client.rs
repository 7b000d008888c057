use super::{CommitStream, HorizonTransport, TransportError};
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use horizon_kernel::config::TUNNEL_ROUTE;
use horizon_kernel::{CommittedEventStream, OpenTunnel};
use reqwest::Client;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Tunnel transport over HTTP: the handshake is POSTed as JSON, the horizon
/// answers with one JSON `CommittedEventStream` per line for as long as the
/// connection stays open.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    shutdown: CancellationToken,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn open_stream(&self, handshake: OpenTunnel) -> Result<CommitStream, TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let url = format!("{}{}", self.base_url, TUNNEL_ROUTE);
        let resp = self
            .client
            .post(&url)
            .json(&handshake)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransportError::Refused(resp.status().as_u16()));
        }

        let shutdown = self.shutdown.clone();
        Ok(decode_lines(resp.bytes_stream())
            .take_until(async move { shutdown.cancelled().await })
            .boxed())
    }
}

impl HorizonTransport for HttpTransport {
    fn open(&self, handshake: OpenTunnel) -> BoxFuture<'_, Result<CommitStream, TransportError>> {
        Box::pin(self.open_stream(handshake))
    }

    fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct LineState<S> {
    chunks: Pin<Box<S>>,
    buffer: Vec<u8>,
    done: bool,
}

/// Split a chunked body into JSON lines. Malformed lines are skipped; a
/// chunk error is yielded once and ends the stream.
pub(crate) fn decode_lines<S, B, E>(chunks: S) -> CommitStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = LineState {
        chunks: Box::pin(chunks),
        buffer: Vec::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(idx) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=idx).collect();
                if let Some(batch) = parse_line(&line) {
                    return Some((Ok(batch), state));
                }
                continue;
            }

            if state.done {
                // Trailing line without a newline
                let rest = std::mem::take(&mut state.buffer);
                return parse_line(&rest).map(|batch| (Ok(batch), state));
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((Err(TransportError::Network(e.to_string())), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Option<CommittedEventStream> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<CommittedEventStream>(line) {
        Ok(batch) => Some(batch),
        Err(e) => {
            tracing::warn!("Tunnel: skipping malformed line: {}", e);
            None
        }
    }
}
