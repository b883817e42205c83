//! HTTP server lifetime for one boot.
//!
//! axum runs every connection on its own task, outside the accept loop.
//! Shutting down signals each of them: idle keep-alive connections close at
//! once, busy ones after their current response.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A running HTTP server.
pub struct HttpServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Start serving `app` on `listener`.
    pub fn spawn(listener: TcpListener, app: Router) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let signal = async move {
                // A dropped sender counts as a shutdown request too.
                let _ = signal.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                error!("HTTP server error: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            shutdown,
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves if the server stops without being asked to.
    pub async fn stopped(&mut self) {
        match self.task.as_mut() {
            Some(task) => {
                let _ = task.await;
                self.task = None;
            }
            None => std::future::pending().await,
        }
    }

    /// Stop accepting, close every connection and release the listener.
    ///
    /// Requests already in flight get up to `grace` to finish. After that
    /// the accept loop is aborted; connections still busy were already told
    /// to close after their current response.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(());
        let Some(mut task) = self.task else {
            return;
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => debug!("HTTP server on {} drained", self.local_addr),
            Err(_) => {
                warn!(
                    "HTTP connections on {} still busy after {:?}, aborting",
                    self.local_addr, grace
                );
                task.abort();
                let _ = task.await;
            }
        }
    }
}
