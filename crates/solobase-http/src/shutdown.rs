//! Accept loop and graceful shutdown: accept connections until `Ctrl+C`,
//! then stop accepting and wait (bounded by a deadline) for in-flight
//! requests to finish before exiting.

use std::time::Duration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::service::SolobaseService;

/// Run the accept loop, serving connections with `service` until `Ctrl+C` is
/// received, then drain in-flight connections for up to `shutdown_deadline`
/// before returning.
pub async fn serve(listener: TcpListener, service: SolobaseService, shutdown_deadline: Duration) -> Result<()> {
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    match tokio::time::timeout(shutdown_deadline, graceful.shutdown()).await {
        Ok(()) => info!("all connections drained, exiting"),
        Err(_) => warn!(
            deadline_secs = shutdown_deadline.as_secs(),
            "shutdown deadline elapsed with connections still in flight"
        ),
    }

    Ok(())
}

/// Bind the listen address, wrapping the error with the address for
/// diagnosability.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))
}
