//! HTTP listener running in its own task.
//!
//! Every accepted connection is served by hyper in a task owned by the
//! listener task, so shutdown can first drain them and then abort whatever
//! is left once the grace period runs out.

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::shutdown::{ShutdownReason, ShutdownTrigger};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("in-flight requests did not finish within {0:?}, remaining connections were aborted")]
    GraceElapsed(Duration),

    #[error("http server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Per-connection deadlines enforced below the router.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    pub header_read: Duration,
    pub idle: Duration,
}

impl From<&ServerConfig> for ConnectionTimeouts {
    fn from(config: &ServerConfig) -> Self {
        Self {
            header_read: config.header_read_timeout,
            idle: config.idle_timeout,
        }
    }
}

pub struct Server {
    task: JoinHandle<()>,
    stop: Option<oneshot::Sender<()>>,
    force: Option<oneshot::Sender<()>>,
}

impl Server {
    /// Binds `config.addr` and serves `app` in the background.
    ///
    /// Bind and accept failures are reported through `trigger` rather than
    /// returned, so they reach the lifecycle manager like any other reason
    /// to stop.
    pub fn start(config: &ServerConfig, app: Router, trigger: ShutdownTrigger) -> Self {
        let addr = config.addr;
        let timeouts = ConnectionTimeouts::from(config);

        Self::launch(move |stopped, forced| async move {
            match TcpListener::bind(addr).await {
                Ok(listener) => serve(listener, app, timeouts, stopped, forced, trigger).await,
                Err(err) => {
                    tracing::error!(%addr, error = %err, "Could not bind http listener");
                    trigger.fire(ShutdownReason::ListenerFailed(err));
                }
            }
        })
    }

    /// Serves on an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        config: &ServerConfig,
        app: Router,
        trigger: ShutdownTrigger,
    ) -> Self {
        let timeouts = ConnectionTimeouts::from(config);

        Self::launch(move |stopped, forced| {
            serve(listener, app, timeouts, stopped, forced, trigger)
        })
    }

    fn launch<F, Fut>(serve: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>, oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        let (force, forced) = oneshot::channel();

        Self {
            task: tokio::spawn(serve(stopped, forced)),
            stop: Some(stop),
            force: Some(force),
        }
    }

    /// Stops accepting and waits up to `grace` for in-flight requests.
    ///
    /// Connections still open after `grace` are aborted, and `stop` returns
    /// only once their tasks are gone.
    pub async fn stop(mut self, grace: Duration) -> Result<(), ServerError> {
        if let Some(stop) = self.stop.take() {
            // The accept loop may already be gone after a listener failure.
            let _ = stop.send(());
        }

        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => joined.map_err(ServerError::from),
            Err(_) => {
                if let Some(force) = self.force.take() {
                    let _ = force.send(());
                }
                (&mut self.task).await?;
                Err(ServerError::GraceElapsed(grace))
            }
        }
    }
}

async fn serve(
    listener: TcpListener,
    app: Router,
    timeouts: ConnectionTimeouts,
    mut stopped: oneshot::Receiver<()>,
    mut forced: oneshot::Receiver<()>,
    trigger: ShutdownTrigger,
) {
    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, "http server started"),
        Err(err) => tracing::warn!(error = %err, "Could not read listener address"),
    }

    let (draining_tx, draining) = watch::channel(false);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote_addr,
                        app.clone(),
                        timeouts,
                        draining.clone(),
                    ));
                }
                Err(err) if is_connection_error(&err) => {
                    tracing::debug!(error = %err, "Connection dropped before accept");
                }
                Err(err) => {
                    tracing::error!(error = %err, "http server failed");
                    trigger.fire(ShutdownReason::ListenerFailed(err));
                    break;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                log_connection_exit(joined);
            }
            _ = &mut stopped => break,
        }
    }

    drop(listener);
    let _ = draining_tx.send(true);
    tracing::info!(
        connections = connections.len(),
        "http server draining in-flight requests"
    );

    let drained = loop {
        tokio::select! {
            joined = connections.join_next() => match joined {
                Some(joined) => log_connection_exit(joined),
                None => break true,
            },
            _ = &mut forced => break false,
        }
    };

    if !drained {
        tracing::warn!(
            connections = connections.len(),
            "Grace period elapsed, aborting open connections"
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }

    tracing::info!("http server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    app: Router,
    timeouts: ConnectionTimeouts,
    mut draining: watch::Receiver<bool>,
) {
    let activity = Arc::new(Activity::new());

    let service = {
        let activity = activity.clone();
        hyper::service::service_fn(move |request: Request<Incoming>| {
            let active = activity.begin();
            let response = app.clone().oneshot(request.map(Body::new));
            async move {
                let response = response.await;
                drop(active);
                response
            }
        })
    };

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.header_read)
        .keep_alive(true);
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let mut closing = false;
    loop {
        tokio::select! {
            served = connection.as_mut() => {
                if let Err(err) = served {
                    tracing::debug!(%remote_addr, error = %err, "Connection closed with error");
                }
                break;
            }
            _ = draining.changed(), if !closing => {
                if !activity.is_busy() {
                    break;
                }
                // Finish the current response, then close.
                closing = true;
                connection.as_mut().graceful_shutdown();
            }
            _ = tokio::time::sleep_until(activity.idle_deadline(timeouts.idle)), if !closing => {
                if activity.is_idle_for(timeouts.idle) {
                    tracing::debug!(%remote_addr, "Closing idle connection");
                    break;
                }
            }
        }
    }
}

fn log_connection_exit(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            tracing::error!(error = %err, "Connection task panicked");
        }
    }
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Tracks requests on one connection for the idle deadline.
struct Activity {
    in_flight: AtomicUsize,
    last_active: Mutex<Instant>,
}

struct ActiveRequest(Arc<Activity>);

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn begin(self: &Arc<Self>) -> ActiveRequest {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        ActiveRequest(self.clone())
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn last_active(&self) -> Instant {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn idle_deadline(&self, idle: Duration) -> Instant {
        if self.is_busy() {
            Instant::now() + idle
        } else {
            self.last_active() + idle
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn is_idle_for(&self, idle: Duration) -> bool {
        !self.is_busy() && self.last_active().elapsed() >= idle
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
