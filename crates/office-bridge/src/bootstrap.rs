//! Service bootstrap: channel → bridge → root object → factory → desktop.

use std::sync::Arc;
use std::time::Duration;

use crate::capability::{
    Bridge, BridgeFactory, Channel, DisposalListener, FactoryHandle, PropertyValue,
    TransportConnector, DEFAULT_CONTEXT_PROPERTY,
};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{BridgeError, Result};

/// A bootstrapped connection: the bridge and the top-level service on it.
#[derive(Clone)]
pub struct Connection {
    channel: Arc<dyn Channel>,
    bridge: Arc<dyn Bridge>,
    factory: FactoryHandle,
}

impl Connection {
    pub fn factory(&self) -> &FactoryHandle {
        &self.factory
    }

    /// Dispose the bridge and close the channel underneath it.
    pub async fn close(&self) {
        self.bridge.dispose().await;
        close_channel(&self.channel).await;
    }
}

/// Told about each resource a bootstrap opens, so that an owner can close
/// them if the bootstrap future is dropped before it finishes.
pub trait BootstrapObserver: Send + Sync {
    fn channel_opened(&self, channel: &Arc<dyn Channel>);
    fn bridge_created(&self, bridge: &Arc<dyn Bridge>);
}

/// Drives the bootstrap sequence against injected collaborators.
pub struct Bootstrapper {
    connector: Arc<dyn TransportConnector>,
    bridge_factory: Arc<dyn BridgeFactory>,
    service_name: String,
    connect_timeout: Option<Duration>,
}

impl Bootstrapper {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        bridge_factory: Arc<dyn BridgeFactory>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            bridge_factory,
            service_name: service_name.into(),
            connect_timeout: None,
        }
    }

    /// Bound the transport connect step. `None` leaves timing to the transport.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Run the full sequence. On failure everything opened so far is closed
    /// again before the error is returned.
    pub async fn bootstrap(
        &self,
        descriptor: &ConnectionDescriptor,
        listener: Arc<dyn DisposalListener>,
        observer: &dyn BootstrapObserver,
    ) -> Result<Connection> {
        tracing::debug!("Bootstrapping remote service via {descriptor}");

        let channel = self.open_channel(&descriptor.transport_spec).await?;
        observer.channel_opened(&channel);
        tracing::info!("Connected to {}", channel.description());

        // Anonymous bridge, no instance provider.
        let bridge = match self
            .bridge_factory
            .create_bridge("", &descriptor.protocol_name, channel.clone(), None)
            .await
        {
            Ok(bridge) => {
                observer.bridge_created(&bridge);
                bridge
            }
            Err(e) => {
                close_channel(&channel).await;
                return Err(e);
            }
        };

        // Registered before any further remote call so a teardown racing
        // with the rest of the sequence is never missed.
        bridge.add_disposal_listener(listener);

        match self.resolve_factory(&*bridge, descriptor).await {
            Ok(factory) => Ok(Connection {
                channel,
                bridge,
                factory,
            }),
            Err(e) => {
                tracing::debug!("Bootstrap failed, disposing bridge: {e}");
                bridge.dispose().await;
                close_channel(&channel).await;
                Err(e)
            }
        }
    }

    async fn open_channel(&self, transport_spec: &str) -> Result<Arc<dyn Channel>> {
        let connect = self.connector.connect(transport_spec);
        match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                BridgeError::ConnectTimeout {
                    transport: transport_spec.to_string(),
                    timeout,
                }
            })?,
            None => connect.await,
        }
    }

    async fn resolve_factory(
        &self,
        bridge: &dyn Bridge,
        descriptor: &ConnectionDescriptor,
    ) -> Result<FactoryHandle> {
        let root_id = &descriptor.root_object_id;

        // 1. The root object exported under the descriptor's name
        let root = bridge.get_root_object(root_id).await?.ok_or_else(|| {
            BridgeError::Bootstrap(format!("server didn't provide an instance for {root_id}"))
        })?;
        tracing::debug!("Got root object OID={}", root.oid());

        // 2. Its service manager
        let service_manager = root.query_factory().await?.ok_or_else(|| {
            BridgeError::Bootstrap(format!("root object {root_id} is not a service factory"))
        })?;
        tracing::info!("Got ServiceManager: {}", service_manager.oid());

        // 3. The office's own component context
        let context = match service_manager.get_property(DEFAULT_CONTEXT_PROPERTY).await? {
            PropertyValue::Context(ctx) => ctx,
            PropertyValue::Void => {
                return Err(BridgeError::Bootstrap(format!(
                    "service manager has no {DEFAULT_CONTEXT_PROPERTY}"
                )));
            }
            other => {
                return Err(BridgeError::Bootstrap(format!(
                    "{DEFAULT_CONTEXT_PROPERTY} is not a component context: {other:?}"
                )));
            }
        };
        tracing::debug!("Got XComponentContext OID={}", context.oid());

        // 4. The top-level service, created in the remote context
        let service = &self.service_name;
        let instance = service_manager
            .create_instance(service, context)
            .await?
            .ok_or_else(|| BridgeError::Bootstrap(format!("couldn't instantiate {service}")))?;

        let factory = instance.query_factory().await?.ok_or_else(|| {
            BridgeError::Bootstrap(format!("{service} does not provide the factory capability"))
        })?;
        tracing::info!("Got {service}: {}", factory.oid());

        Ok(factory)
    }
}

async fn close_channel(channel: &Arc<dyn Channel>) {
    if let Err(e) = channel.close().await {
        tracing::warn!("Failed to close channel {}: {e}", channel.description());
    }
}
