//! Single-file transfer over TCP.
//!
//! A [`Sender`] streams one local file to a remote [`Receiver`]. On the
//! receiving side a [`Dispatcher`] accepts connections and runs one
//! receiver session per connection on its own task.
//!
//! The wire format lives in `filedrop-protocol`.

pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod receiver;
pub mod sender;
pub mod session;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::TransferError;
pub use guard::IoGuard;
pub use receiver::{ReceivedFile, Receiver, ReceiverConfig};
pub use sender::{SendReport, Sender, SenderConfig};
pub use session::{Phase, TransferSession};

use std::time::Duration;

use tokio::sync::mpsc;

/// Timeout for establishing the outgoing connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle deadline applied to every read and write of a session.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a shutting-down dispatcher waits for in-flight sessions.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Payload progress of one session.
///
/// Delivery is lossy: events are sent with `try_send` and dropped while the
/// channel is full, so a slow consumer may miss any event, the final one
/// included. Use the returned [`SendReport`] or [`ReceivedFile`] for the
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub name: String,
    pub transferred: u64,
    pub total: u64,
}

/// Reports progress without blocking the transfer; drops the event if the
/// channel is full.
fn report_progress(tx: Option<&mpsc::Sender<Progress>>, name: &str, session: &TransferSession) {
    if let Some(tx) = tx {
        let _ = tx.try_send(Progress {
            name: name.to_string(),
            transferred: session.bytes_transferred(),
            total: session.expected_size(),
        });
    }
}
