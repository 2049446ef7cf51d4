//! Connection status indicator for a presentation layer.

use std::fmt;

use tokio::sync::watch;

/// What a status label shows for the managed connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The last bootstrap failed with this message.
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Failed(msg) => f.write_str(msg),
        }
    }
}

/// Publishes status changes; any number of receivers may watch them.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionStatus::Disconnected);
        Self { tx }
    }

    pub fn set(&self, status: ConnectionStatus) {
        // send_replace keeps the value even while nobody is subscribed
        self.tx.send_replace(status);
    }

    pub fn current(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
