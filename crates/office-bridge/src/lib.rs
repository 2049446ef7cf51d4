//! Connection-aware client for a running office process.
//!
//! The office is started with a listener, for example:
//!
//! ```text
//! soffice --headless --accept="socket,host=localhost,port=2002;urp;StarOffice.ServiceManager"
//! ```
//!
//! and reached with the matching descriptor
//! `uno:socket,host=localhost,port=2002;urp;StarOffice.ServiceManager`.
//!
//! # Architecture
//!
//! - **Descriptor** (`descriptor.rs`): splits a descriptor into transport
//!   spec, protocol name and root object id
//! - **Capabilities** (`capability.rs`): the traits a bridge runtime
//!   implements (connector, bridge factory, bridge, remote objects)
//! - **Bootstrap** (`bootstrap.rs`): channel → bridge → root object →
//!   service manager → default context → Desktop
//! - **Manager** (`manager.rs`): caches the bootstrapped factory in a single
//!   slot and drops it when the bridge reports its disposal
//!
//! `socket.rs` provides a TCP [`TransportConnector`]; the bridge protocol
//! itself comes from the runtime plugged in as [`BridgeFactory`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use office_bridge::{BridgeFactory, ConnectionManager, ManagerConfig, SocketConnector};
//!
//! # async fn example(runtime: Arc<dyn BridgeFactory>) -> office_bridge::Result<()> {
//! let manager = ConnectionManager::new(
//!     ManagerConfig::default(),
//!     Arc::new(SocketConnector::new()),
//!     runtime,
//! )?;
//! let desktop = manager.get_factory().await?;
//! // Later calls return the same handle until the office goes away.
//! let again = manager.get_factory().await?;
//! assert!(Arc::ptr_eq(&desktop, &again));
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod capability;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod socket;
pub mod status;

pub use bootstrap::{BootstrapObserver, Bootstrapper, Connection};
pub use capability::{
    Bridge, BridgeFactory, Channel, DisposalEvent, DisposalListener, Factory, FactoryHandle,
    InstanceProvider, PropertyValue, RemoteContext, RemoteObject, TransportConnector,
};
pub use config::ManagerConfig;
pub use descriptor::{ConnectionDescriptor, TransportSpec};
pub use error::{BridgeError, ErrorKind, Result};
pub use manager::{CacheState, ConnectionManager};
pub use socket::{SocketChannel, SocketConnector};
pub use status::{ConnectionStatus, StatusReporter};
