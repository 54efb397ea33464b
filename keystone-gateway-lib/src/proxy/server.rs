use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::tls::build_tls_acceptor;

use super::pipeline::handle;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Decrements the active-connection counter when a connection finishes
struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::Relaxed);
        // Notify when the last connection closes
        if remaining == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Accept loop: serve until SIGINT/SIGTERM, then stop probes, close the
/// script pool, and drain in-flight connections with a grace period
pub async fn run(gateway: Arc<Gateway>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(GatewayError::Io)?;
    let builder = ConnBuilder::new(TokioExecutor::new());

    let tls_acceptor = match gateway.config.tls.as_ref().filter(|t| t.enabled) {
        Some(tls_cfg) => Some(build_tls_acceptor(tls_cfg)?),
        None => None,
    };
    let proto: &'static str = if tls_acceptor.is_some() { "https" } else { "http" };

    let probes = gateway.start_probes();

    let active_connections = Arc::new(AtomicUsize::new(0));
    let (connections_closed_tx, mut connections_closed_rx) = watch::channel(());

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(GatewayError::Io)?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(GatewayError::Io)?;

    info!(%addr, proto, tenants = gateway.table.tenants().len(), "gateway listening");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);
                let guard = ConnectionGuard {
                    counter: Arc::clone(&active_connections),
                    notifier: connections_closed_tx.clone(),
                };

                let gateway = Arc::clone(&gateway);
                let builder = builder.clone();
                let tls_acceptor = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    let svc = service_fn(move |req| {
                        let gateway = Arc::clone(&gateway);
                        async move {
                            Ok::<_, hyper::Error>(handle(gateway, req, peer, proto).await)
                        }
                    });

                    match tls_acceptor {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                if let Err(e) = builder
                                    .serve_connection(TokioIo::new(tls_stream), svc)
                                    .await
                                {
                                    warn!(?peer, error = %e, "serve_connection error");
                                }
                            }
                            Err(e) => warn!(?peer, error = %e, "tls accept error"),
                        },
                        None => {
                            if let Err(e) =
                                builder.serve_connection(TokioIo::new(stream), svc).await
                            {
                                warn!(?peer, error = %e, "serve_connection error");
                            }
                        }
                    }
                });
            }
        }
    }

    probes.stop().await;
    gateway.shutdown();

    if active_connections.load(Ordering::Relaxed) > 0 {
        info!(
            "waiting up to {}s for active connections to finish",
            SHUTDOWN_GRACE.as_secs()
        );
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        tokio::select! {
            _ = connections_closed_rx.changed() => {
                info!("all connections closed");
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(
                    active = active_connections.load(Ordering::Relaxed),
                    "shutdown grace elapsed with connections still active"
                );
            }
        }
    }

    info!("gateway stopped");
    Ok(())
}
