//! Capabilities consumed from the bridge runtime.
//!
//! The remote object model is reached through a handful of typed traits
//! instead of runtime interface queries. A real runtime implements them over
//! its wire protocol; tests implement them with in-memory stubs.
//!
//! ```text
//! TransportConnector ──connect──▶ Channel
//! BridgeFactory ──create_bridge(channel)──▶ Bridge
//! Bridge ──get_root_object──▶ RemoteObject ──query_factory──▶ Factory
//! Factory ──get_property("DefaultContext")──▶ RemoteContext
//! Factory ──create_instance(service, context)──▶ RemoteObject
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Property holding the remote process's default component context.
pub const DEFAULT_CONTEXT_PROPERTY: &str = "DefaultContext";

/// Opens raw channels to the remote process.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a channel for the transport part of a descriptor
    /// (e.g. `socket,host=localhost,port=2002`).
    ///
    /// Unreachable peers should be reported as [`BridgeError::Connect`].
    ///
    /// [`BridgeError::Connect`]: crate::error::BridgeError::Connect
    async fn connect(&self, transport_spec: &str) -> Result<Arc<dyn Channel>>;
}

/// A raw, bidirectional byte channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable description of both endpoints.
    fn description(&self) -> String;

    /// Read up to `len` bytes. Returns fewer only at end of stream.
    async fn read(&self, len: usize) -> Result<Bytes>;

    async fn write(&self, data: &[u8]) -> Result<()>;

    async fn flush(&self) -> Result<()>;

    /// Close the channel. Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Supplies local objects to the remote side on request.
pub trait InstanceProvider: Send + Sync {
    fn get_instance(&self, name: &str) -> Option<Arc<dyn RemoteObject>>;
}

/// Creates protocol bridges over open channels.
#[async_trait]
pub trait BridgeFactory: Send + Sync {
    /// Wrap `channel` in a bridge speaking `protocol`. An empty `name`
    /// creates an anonymous bridge.
    ///
    /// Negotiation failures should be reported as [`BridgeError::Protocol`].
    ///
    /// [`BridgeError::Protocol`]: crate::error::BridgeError::Protocol
    async fn create_bridge(
        &self,
        name: &str,
        protocol: &str,
        channel: Arc<dyn Channel>,
        instance_provider: Option<Arc<dyn InstanceProvider>>,
    ) -> Result<Arc<dyn Bridge>>;
}

/// A live protocol bridge to the remote process.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Register a listener for the bridge's teardown. Listeners may be
    /// invoked from any thread, at most once per bridge.
    fn add_disposal_listener(&self, listener: Arc<dyn DisposalListener>);

    /// Fetch the object the remote side exports under `name`.
    async fn get_root_object(&self, name: &str) -> Result<Option<Arc<dyn RemoteObject>>>;

    /// Tear the bridge down and notify its disposal listeners.
    async fn dispose(&self);
}

/// A reference to an object living in the remote process.
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Object identifier, used for logging.
    fn oid(&self) -> &str;

    /// Query the object for the factory capability.
    async fn query_factory(&self) -> Result<Option<Arc<dyn Factory>>>;
}

/// A remote component context.
pub trait RemoteContext: Send + Sync + fmt::Debug {
    fn oid(&self) -> &str;
}

/// Values returned by [`Factory::get_property`].
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Void,
    Bool(bool),
    Long(i32),
    String(String),
    Context(Arc<dyn RemoteContext>),
}

/// The factory capability: property access plus service instantiation.
#[async_trait]
pub trait Factory: Send + Sync {
    fn oid(&self) -> &str;

    async fn get_property(&self, name: &str) -> Result<PropertyValue>;

    /// Instantiate `service` within `context`. Returns `None` if the remote
    /// side does not know the service.
    async fn create_instance(
        &self,
        service: &str,
        context: Arc<dyn RemoteContext>,
    ) -> Result<Option<Arc<dyn RemoteObject>>>;
}

/// Handle to the bootstrapped top-level service, as handed to callers.
pub type FactoryHandle = Arc<dyn Factory>;

/// Notification that a bridge has gone away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposalEvent;

/// Receives bridge teardown notifications.
pub trait DisposalListener: Send + Sync {
    fn on_disposing(&self, event: &DisposalEvent);
}
