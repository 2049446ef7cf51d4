//! Configuration for a [`ConnectionManager`](crate::ConnectionManager).

use std::time::Duration;

use crate::descriptor::DEFAULT_SCHEME;

/// Descriptor the office's default `--accept` listener answers to.
pub const DEFAULT_DESCRIPTOR: &str =
    "uno:socket,host=localhost,port=2002;urp;StarOffice.ServiceManager";

/// Top-level service created once the remote context is known.
pub const DEFAULT_SERVICE: &str = "com.sun.star.frame.Desktop";

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Connection descriptor, `<scheme>:<transport>;<protocol>;<root object>`.
    pub descriptor: String,
    /// Scheme the descriptor must start with. Default: "uno".
    pub scheme: String,
    /// Service instantiated against the remote context. Default: the Desktop.
    pub service_name: String,
    /// Upper bound for opening the transport channel. Default: none, the
    /// transport's own behaviour applies.
    pub connect_timeout: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            descriptor: DEFAULT_DESCRIPTOR.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            service_name: DEFAULT_SERVICE.to_string(),
            connect_timeout: None,
        }
    }
}

impl ManagerConfig {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            ..Default::default()
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}
