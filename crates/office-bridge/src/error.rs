//! Error types for the connection bootstrapper.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while parsing descriptors or bootstrapping a
/// connection to the remote office process.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Malformed connection descriptor `{descriptor}`: {reason}")]
    MalformedDescriptor {
        descriptor: String,
        reason: &'static str,
    },

    #[error("Failed to connect to `{transport}`: {message}")]
    Connect { transport: String, message: String },

    #[error("Connection timeout: `{transport}` did not answer within {timeout:?}")]
    ConnectTimeout { transport: String, timeout: Duration },

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Remote bridge was disposed during bootstrap")]
    Disposed,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote call failed: {0}")]
    Runtime(String),
}

/// Coarse classification of a [`BridgeError`], as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The descriptor could not be parsed. Fix the input.
    MalformedDescriptor,
    /// The transport was unreachable, timed out, or went away mid-bootstrap.
    Connect,
    /// Bridge negotiation failed.
    Protocol,
    /// The remote peer did not provide the expected objects.
    Bootstrap,
    /// Any other collaborator failure, passed through.
    RuntimeForwarded,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            BridgeError::Connect { .. }
            | BridgeError::ConnectTimeout { .. }
            | BridgeError::Disposed => ErrorKind::Connect,
            BridgeError::Protocol(_) => ErrorKind::Protocol,
            BridgeError::Bootstrap(_) => ErrorKind::Bootstrap,
            BridgeError::ConnectionClosed | BridgeError::Io(_) | BridgeError::Runtime(_) => {
                ErrorKind::RuntimeForwarded
            }
        }
    }

    pub(crate) fn malformed(descriptor: &str, reason: &'static str) -> Self {
        BridgeError::MalformedDescriptor {
            descriptor: descriptor.to_string(),
            reason,
        }
    }

    /// Wrap an arbitrary collaborator failure.
    pub fn runtime(err: impl std::fmt::Display) -> Self {
        BridgeError::Runtime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
