//! Connection dispatcher (receiving side).
//!
//! Binds a TCP listener and runs one [`Receiver`] session per accepted
//! connection on its own task. Sessions share nothing but the output
//! directory; a failed session never reaches the accept loop.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::DEFAULT_SHUTDOWN_GRACE;
use crate::error::TransferError;
use crate::receiver::{Receiver, ReceiverConfig};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Address to listen on, e.g. `0.0.0.0:5001`.
    pub bind_addr: String,
    /// Directory received files are written into.
    pub output_dir: PathBuf,
    pub receiver: ReceiverConfig,
    /// Time in-flight sessions get to finish after shutdown is requested.
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5001".into(),
            output_dir: PathBuf::from("received_files"),
            receiver: ReceiverConfig::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Accept loop handing each connection to a fresh receiver session.
pub struct Dispatcher {
    listener: TcpListener,
    receiver: Receiver,
    shutdown: CancellationToken,
    sessions: CancellationToken,
    tracker: TaskTracker,
    shutdown_grace: Duration,
}

impl Dispatcher {
    /// Creates the output directory if needed and binds the listener.
    pub async fn bind(config: DispatcherConfig) -> Result<Self, TransferError> {
        tokio::fs::create_dir_all(&config.output_dir).await?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            output_dir = %config.output_dir.display(),
            "dispatcher listening"
        );

        let sessions = CancellationToken::new();
        let receiver =
            Receiver::new(config.output_dir, config.receiver).with_cancel(sessions.clone());

        Ok(Self {
            listener,
            receiver,
            shutdown: CancellationToken::new(),
            sessions,
            tracker: TaskTracker::new(),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the accept loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until the shutdown token fires, then drains.
    ///
    /// After shutdown the listener is closed at once; in-flight sessions
    /// get the grace period to finish and are cancelled afterwards.
    pub async fn run(self) {
        let Dispatcher {
            listener,
            receiver,
            shutdown,
            sessions,
            tracker,
            shutdown_grace,
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer)) => spawn_session(&tracker, &receiver, stream, peer),
                    Err(e) => error!("accept error: {e}"),
                },
            }
        }

        drop(listener);
        tracker.close();
        info!(in_flight = tracker.len(), "dispatcher stopped accepting");

        if tokio::time::timeout(shutdown_grace, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = tracker.len(),
                "grace period elapsed, cancelling in-flight transfers"
            );
            sessions.cancel();
            tracker.wait().await;
        }

        info!("dispatcher shut down");
    }
}

fn spawn_session(
    tracker: &TaskTracker,
    receiver: &Receiver,
    mut stream: TcpStream,
    peer: SocketAddr,
) {
    let receiver = receiver.clone();
    let span = info_span!("session", id = %Uuid::new_v4(), %peer);

    tracker.spawn(
        async move {
            info!("connection accepted");
            match receiver.receive(&mut stream).await {
                Ok(file) => info!(
                    name = %file.name,
                    bytes = file.bytes_transferred,
                    "transfer complete"
                ),
                Err(e) => warn!("transfer failed: {e}"),
            }
        }
        .instrument(span),
    );
}
