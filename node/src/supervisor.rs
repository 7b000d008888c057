//! Owning and closing tunnels.

use crate::config::NodeConfig;
use crate::network::{HorizonTransport, HttpTransport};
use crate::processing::EventProcessors;
use crate::store::EventStore;
use crate::tunnel::{EventHorizonTunnel, TunnelSettings, TunnelStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running tunnel. Dropping it closes the tunnel.
pub struct TunnelHandle {
    url: String,
    cancel: CancellationToken,
    transport: Arc<dyn HorizonTransport>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<TunnelStats>,
}

impl TunnelHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> Arc<TunnelStats> {
        self.stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the run loop and release the transport. Only the first call does
    /// anything, concurrent callers included.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Closing tunnel towards {}", self.url);
        self.cancel.cancel();
        self.transport.shutdown();
    }

    /// Wait for the run loop to finish. Returns immediately when already joined.
    pub async fn join(&self) {
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Tunnel task towards {} failed: {}", self.url, e);
            }
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct TunnelSupervisor {
    tunnels: Vec<TunnelHandle>,
}

impl TunnelSupervisor {
    /// Build a tunnel and schedule its run loop on the current runtime.
    pub fn open(
        settings: TunnelSettings,
        store: Arc<dyn EventStore>,
        processors: Arc<dyn EventProcessors>,
        transport: Arc<dyn HorizonTransport>,
    ) -> TunnelHandle {
        let url = settings.url.clone();
        let cancel = CancellationToken::new();
        let tunnel = EventHorizonTunnel::new(settings, store, processors, transport.clone());
        let stats = tunnel.stats();
        let task = tokio::spawn(tunnel.run(cancel.clone()));

        TunnelHandle {
            url,
            cancel,
            transport,
            closed: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
            stats,
        }
    }

    /// One HTTP tunnel per configured event horizon.
    pub fn start(
        config: &NodeConfig,
        store: Arc<dyn EventStore>,
        processors: Arc<dyn EventProcessors>,
    ) -> Self {
        let tunnels = config
            .event_horizons
            .0
            .iter()
            .map(|horizon| {
                let settings = TunnelSettings::for_horizon(config, horizon);
                let transport: Arc<dyn HorizonTransport> = Arc::new(HttpTransport::new(horizon.url.clone()));
                Self::open(settings, store.clone(), processors.clone(), transport)
            })
            .collect::<Vec<_>>();

        tracing::info!("Started {} tunnel(s)", tunnels.len());
        Self { tunnels }
    }

    pub fn tunnels(&self) -> &[TunnelHandle] {
        &self.tunnels
    }

    /// Close every tunnel and wait for the run loops to end.
    pub async fn shutdown(self) {
        for tunnel in &self.tunnels {
            tunnel.close();
        }
        for tunnel in &self.tunnels {
            tunnel.join().await;
        }
    }
}

/// Resolves on SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        _ = sigint.recv() => tracing::info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");
    Ok(())
}
