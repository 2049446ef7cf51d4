//! In-memory office: a scripted connector, bridge factory and remote objects.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use office_bridge::{
    Bridge, BridgeError, BridgeFactory, Channel, ConnectionManager, DisposalEvent,
    DisposalListener, Factory, InstanceProvider, ManagerConfig, PropertyValue, RemoteContext,
    RemoteObject, Result, TransportConnector,
};
use tokio::sync::Notify;

pub const DESCRIPTOR: &str = "proto:socket,host=localhost,port=2002;h;Root.SM";

/// Where the scripted office misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Transport refuses the connection.
    Connect,
    /// Bridge negotiation fails.
    CreateBridge,
    /// No object under the root name.
    RootMissing,
    /// Root object is not a factory.
    RootNotFactory,
    /// `DefaultContext` is void.
    NoContext,
    /// `DefaultContext` is not a context.
    ContextWrongType,
    /// Reading `DefaultContext` raises a remote error.
    PropertyRaises,
    /// The service cannot be instantiated.
    NoInstance,
    /// The instance does not provide the factory capability.
    InstanceNotFactory,
}

/// Shared bookkeeping for everything the office hands out.
#[derive(Default)]
pub struct OfficeState {
    pub connects: AtomicUsize,
    pub channels_closed: AtomicUsize,
    pub bridges_disposed: AtomicUsize,
    pub bridges: Mutex<Vec<Arc<MockBridge>>>,
    pub failure: Mutex<Option<Failure>>,
    /// When set, `get_root_object` waits for `release` before answering.
    pub hold_root: AtomicBool,
    pub entered_root: Notify,
    pub release_root: Notify,
}

impl OfficeState {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn channels_closed(&self) -> usize {
        self.channels_closed.load(Ordering::SeqCst)
    }

    pub fn bridges_disposed(&self) -> usize {
        self.bridges_disposed.load(Ordering::SeqCst)
    }

    pub fn fail_at(&self, failure: Option<Failure>) {
        *self.failure.lock().unwrap() = failure;
    }

    fn failure(&self) -> Option<Failure> {
        *self.failure.lock().unwrap()
    }

    pub fn bridge(&self, index: usize) -> Arc<MockBridge> {
        self.bridges.lock().unwrap()[index].clone()
    }

    pub fn last_bridge(&self) -> Arc<MockBridge> {
        self.bridges.lock().unwrap().last().cloned().unwrap()
    }
}

pub struct MockOffice {
    pub state: Arc<OfficeState>,
}

impl MockOffice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(OfficeState::default()),
        }
    }

    pub fn connector(&self) -> Arc<MockConnector> {
        Arc::new(MockConnector {
            state: self.state.clone(),
        })
    }

    pub fn bridge_factory(&self) -> Arc<MockBridgeFactory> {
        Arc::new(MockBridgeFactory {
            state: self.state.clone(),
        })
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager_with(ManagerConfig::new(DESCRIPTOR).with_scheme("proto"))
    }

    pub fn manager_with(&self, config: ManagerConfig) -> ConnectionManager {
        ConnectionManager::new(config, self.connector(), self.bridge_factory()).unwrap()
    }
}

pub struct MockConnector {
    state: Arc<OfficeState>,
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, transport_spec: &str) -> Result<Arc<dyn Channel>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.failure() == Some(Failure::Connect) {
            return Err(BridgeError::Connect {
                transport: transport_spec.to_string(),
                message: "Connection refused".into(),
            });
        }
        Ok(Arc::new(MockChannel {
            spec: transport_spec.to_string(),
            closed: AtomicBool::new(false),
            state: self.state.clone(),
        }))
    }
}

pub struct MockChannel {
    spec: String,
    closed: AtomicBool,
    state: Arc<OfficeState>,
}

#[async_trait]
impl Channel for MockChannel {
    fn description(&self) -> String {
        self.spec.clone()
    }

    async fn read(&self, _len: usize) -> Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn write(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.channels_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct MockBridgeFactory {
    state: Arc<OfficeState>,
}

#[async_trait]
impl BridgeFactory for MockBridgeFactory {
    async fn create_bridge(
        &self,
        name: &str,
        protocol: &str,
        _channel: Arc<dyn Channel>,
        instance_provider: Option<Arc<dyn InstanceProvider>>,
    ) -> Result<Arc<dyn Bridge>> {
        assert_eq!(name, "", "bridges are anonymous");
        assert!(instance_provider.is_none());
        if self.state.failure() == Some(Failure::CreateBridge) {
            return Err(BridgeError::Protocol(format!(
                "protocol `{protocol}` not supported"
            )));
        }
        let bridge = Arc::new(MockBridge {
            protocol: protocol.to_string(),
            listeners: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            state: self.state.clone(),
        });
        self.state.bridges.lock().unwrap().push(bridge.clone());
        Ok(bridge as Arc<dyn Bridge>)
    }
}

pub struct MockBridge {
    pub protocol: String,
    listeners: Mutex<Vec<Arc<dyn DisposalListener>>>,
    disposed: AtomicBool,
    state: Arc<OfficeState>,
}

impl MockBridge {
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Simulate the remote side going away.
    pub fn fire_disposal(&self) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_disposing(&DisposalEvent);
        }
    }
}

#[async_trait]
impl Bridge for MockBridge {
    fn add_disposal_listener(&self, listener: Arc<dyn DisposalListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    async fn get_root_object(&self, name: &str) -> Result<Option<Arc<dyn RemoteObject>>> {
        if self.state.hold_root.load(Ordering::SeqCst) {
            self.state.entered_root.notify_one();
            self.state.release_root.notified().await;
        }

        let failure = self.state.failure();
        if failure == Some(Failure::RootMissing) {
            return Ok(None);
        }

        let service_manager: Option<Arc<dyn Factory>> = if failure == Some(Failure::RootNotFactory)
        {
            None
        } else {
            Some(Arc::new(MockFactory {
                oid: format!("{name}#factory"),
                failure,
            }))
        };
        Ok(Some(Arc::new(MockObject {
            oid: name.to_string(),
            factory: service_manager,
        })))
    }

    async fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.state.bridges_disposed.fetch_add(1, Ordering::SeqCst);
            self.fire_disposal();
        }
    }
}

pub struct MockObject {
    oid: String,
    factory: Option<Arc<dyn Factory>>,
}

#[async_trait]
impl RemoteObject for MockObject {
    fn oid(&self) -> &str {
        &self.oid
    }

    async fn query_factory(&self) -> Result<Option<Arc<dyn Factory>>> {
        Ok(self.factory.clone())
    }
}

#[derive(Debug)]
pub struct MockContext {
    oid: String,
}

impl RemoteContext for MockContext {
    fn oid(&self) -> &str {
        &self.oid
    }
}

pub struct MockFactory {
    oid: String,
    failure: Option<Failure>,
}

#[async_trait]
impl Factory for MockFactory {
    fn oid(&self) -> &str {
        &self.oid
    }

    async fn get_property(&self, name: &str) -> Result<PropertyValue> {
        assert_eq!(name, "DefaultContext");
        match self.failure {
            Some(Failure::NoContext) => Ok(PropertyValue::Void),
            Some(Failure::ContextWrongType) => Ok(PropertyValue::Long(7)),
            Some(Failure::PropertyRaises) => {
                Err(BridgeError::runtime("com.sun.star.beans.UnknownPropertyException"))
            }
            _ => Ok(PropertyValue::Context(Arc::new(MockContext {
                oid: "ctx".into(),
            }))),
        }
    }

    async fn create_instance(
        &self,
        service: &str,
        context: Arc<dyn RemoteContext>,
    ) -> Result<Option<Arc<dyn RemoteObject>>> {
        assert_eq!(context.oid(), "ctx");
        match self.failure {
            Some(Failure::NoInstance) => Ok(None),
            Some(Failure::InstanceNotFactory) => Ok(Some(Arc::new(MockObject {
                oid: service.to_string(),
                factory: None,
            }))),
            _ => Ok(Some(Arc::new(MockObject {
                oid: service.to_string(),
                factory: Some(Arc::new(MockFactory {
                    oid: format!("{service}#loader"),
                    failure: None,
                })),
            }))),
        }
    }
}

/// Compare two handles by the object they point at.
pub fn same_object(a: &Arc<dyn Factory>, b: &Arc<dyn Factory>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
