//! The connection cache: one lazily bootstrapped, disposal-aware slot.
//!
//! ```text
//!            get_factory()                 success
//!   Empty ─────────────────▶ Bootstrapping ─────────▶ Ready
//!     ▲                         │     │                 │
//!     │         failure         │     │ disposal        │ disposal
//!     ├─────────────────────────┘     ▼                 ▼
//!     └──────────────────────────── Invalidated ◀───────┘
//! ```
//!
//! All slot reads and writes go through one `std::sync::Mutex` that is never
//! held across an `.await`. Bootstraps are serialized by a separate async
//! gate, and every bootstrap gets a new generation number. Disposal
//! listeners carry the generation they were registered for, so a
//! notification from an old bridge cannot clear a newer connection.
//!
//! A caller that drops `get_factory` mid-bootstrap (timeout, `select!`)
//! leaves nothing behind: the slot returns to `Empty` and whatever the
//! bootstrap had opened is closed on a background task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use crate::bootstrap::{BootstrapObserver, Bootstrapper, Connection};
use crate::capability::{
    Bridge, BridgeFactory, Channel, DisposalEvent, DisposalListener, FactoryHandle,
    TransportConnector,
};
use crate::config::ManagerConfig;
use crate::descriptor::ConnectionDescriptor;
use crate::error::{BridgeError, Result};
use crate::status::{ConnectionStatus, StatusReporter};

/// Observable state of the cached factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Bootstrapping,
    Ready,
    /// Disposed while a bootstrap was in flight; collapses to `Empty` once
    /// that bootstrap finishes.
    Invalidated,
}

/// Resources opened by the bootstrap currently in flight.
#[derive(Default)]
struct InFlight {
    channel: Option<Arc<dyn Channel>>,
    bridge: Option<Arc<dyn Bridge>>,
}

impl InFlight {
    fn is_empty(&self) -> bool {
        self.channel.is_none() && self.bridge.is_none()
    }

    /// Dispose and close on the current runtime without waiting.
    fn close_in_background(self) {
        if self.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime to close an abandoned bootstrap's bridge");
            return;
        };
        runtime.spawn(async move {
            if let Some(bridge) = self.bridge {
                bridge.dispose().await;
            }
            if let Some(channel) = self.channel {
                if let Err(e) = channel.close().await {
                    tracing::warn!("Failed to close channel {}: {e}", channel.description());
                }
            }
        });
    }
}

/// The single slot owned by a manager.
struct CachedFactory {
    state: CacheState,
    connection: Option<Connection>,
    in_flight: InFlight,
    generation: u64,
}

impl CachedFactory {
    fn ready_handle(&self) -> Option<FactoryHandle> {
        match (self.state, &self.connection) {
            (CacheState::Ready, Some(conn)) => Some(conn.factory().clone()),
            _ => None,
        }
    }
}

struct Shared {
    slot: Mutex<CachedFactory>,
    status: StatusReporter,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, CachedFactory> {
        // The slot holds no invariants a panicking holder could break halfway.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self) -> Option<FactoryHandle> {
        self.slot().ready_handle()
    }

    fn begin_bootstrap(&self) -> u64 {
        let mut slot = self.slot();
        slot.generation += 1;
        slot.state = CacheState::Bootstrapping;
        slot.connection = None;
        slot.in_flight = InFlight::default();
        slot.generation
    }

    fn track(&self, generation: u64, record: impl FnOnce(&mut InFlight)) {
        let mut slot = self.slot();
        if slot.generation == generation {
            record(&mut slot.in_flight);
        }
    }

    /// Publish a finished bootstrap. Hands the connection back if the slot
    /// was invalidated or superseded in the meantime; the caller closes it
    /// and then calls `abort`.
    fn publish(
        &self,
        generation: u64,
        connection: Connection,
    ) -> std::result::Result<FactoryHandle, Connection> {
        let mut slot = self.slot();
        if slot.generation != generation || slot.state != CacheState::Bootstrapping {
            return Err(connection);
        }
        let handle = connection.factory().clone();
        slot.connection = Some(connection);
        slot.in_flight = InFlight::default();
        slot.state = CacheState::Ready;
        drop(slot);

        self.status.set(ConnectionStatus::Connected);
        Ok(handle)
    }

    fn abort(&self, generation: u64, error: &BridgeError) {
        let mut slot = self.slot();
        if slot.generation == generation {
            slot.state = CacheState::Empty;
            slot.connection = None;
            slot.in_flight = InFlight::default();
        }
        drop(slot);

        self.status.set(ConnectionStatus::Failed(error.to_string()));
    }

    /// The bootstrap for `generation` was abandoned by its caller.
    fn cancel(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.generation != generation
            || !matches!(slot.state, CacheState::Bootstrapping | CacheState::Invalidated)
        {
            return;
        }
        slot.state = CacheState::Empty;
        let in_flight = std::mem::take(&mut slot.in_flight);
        drop(slot);

        tracing::info!("Bootstrap cancelled by caller (generation {generation})");
        self.status.set(ConnectionStatus::Disconnected);
        in_flight.close_in_background();
    }

    fn invalidate(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.generation != generation {
            tracing::debug!(
                "Ignoring disposal of stale bridge (generation {generation}, current {})",
                slot.generation
            );
            return;
        }
        let stale = match slot.state {
            CacheState::Ready => {
                slot.state = CacheState::Invalidated;
                let stale = slot.connection.take();
                slot.state = CacheState::Empty;
                stale
            }
            CacheState::Bootstrapping => {
                slot.state = CacheState::Invalidated;
                None
            }
            CacheState::Empty | CacheState::Invalidated => return,
        };
        drop(slot);
        // The old connection is dropped outside the lock.
        drop(stale);

        tracing::info!("Remote bridge went down (generation {generation})");
        self.status.set(ConnectionStatus::Disconnected);
    }
}

/// Records what an in-flight bootstrap has opened.
struct Tracker<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl BootstrapObserver for Tracker<'_> {
    fn channel_opened(&self, channel: &Arc<dyn Channel>) {
        self.shared
            .track(self.generation, |f| f.channel = Some(channel.clone()));
    }

    fn bridge_created(&self, bridge: &Arc<dyn Bridge>) {
        self.shared
            .track(self.generation, |f| f.bridge = Some(bridge.clone()));
    }
}

/// Resets the slot if the `get_factory` future is dropped mid-bootstrap.
struct CancelGuard<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl CancelGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.cancel(self.generation);
        }
    }
}

/// Listener registered on each new bridge.
struct DisposalHook {
    shared: Weak<Shared>,
    generation: u64,
}

impl DisposalListener for DisposalHook {
    fn on_disposing(&self, _event: &DisposalEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.invalidate(self.generation);
        }
    }
}

/// Owns the cached connection to the remote office process and
/// re-establishes it on demand.
pub struct ConnectionManager {
    descriptor: ConnectionDescriptor,
    bootstrapper: Bootstrapper,
    shared: Arc<Shared>,
    gate: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    /// Create a manager. The descriptor is parsed here; nothing is
    /// connected until the first [`get_factory`](Self::get_factory).
    pub fn new(
        config: ManagerConfig,
        connector: Arc<dyn TransportConnector>,
        bridge_factory: Arc<dyn BridgeFactory>,
    ) -> Result<Self> {
        let descriptor =
            ConnectionDescriptor::parse_with_scheme(&config.descriptor, &config.scheme)?;
        let bootstrapper = Bootstrapper::new(connector, bridge_factory, config.service_name)
            .with_connect_timeout(config.connect_timeout);

        Ok(Self {
            descriptor,
            bootstrapper,
            shared: Arc::new(Shared {
                slot: Mutex::new(CachedFactory {
                    state: CacheState::Empty,
                    connection: None,
                    in_flight: InFlight::default(),
                    generation: 0,
                }),
                status: StatusReporter::new(),
            }),
            gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> CacheState {
        self.shared.slot().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Return the cached factory, bootstrapping a new connection if there
    /// is none. Concurrent callers share a single bootstrap.
    pub async fn get_factory(&self) -> Result<FactoryHandle> {
        if let Some(handle) = self.shared.cached() {
            return Ok(handle);
        }

        let _gate = self.gate.lock().await;
        if let Some(handle) = self.shared.cached() {
            return Ok(handle);
        }

        let generation = self.shared.begin_bootstrap();
        let mut guard = CancelGuard {
            shared: &self.shared,
            generation,
            armed: true,
        };
        self.shared.status.set(ConnectionStatus::Connecting);

        let listener = Arc::new(DisposalHook {
            shared: Arc::downgrade(&self.shared),
            generation,
        });
        let tracker = Tracker {
            shared: &self.shared,
            generation,
        };

        let result = self
            .bootstrapper
            .bootstrap(&self.descriptor, listener, &tracker)
            .await;
        match result {
            Ok(connection) => match self.shared.publish(generation, connection) {
                Ok(handle) => {
                    guard.disarm();
                    tracing::info!("Connection ready (generation {generation})");
                    Ok(handle)
                }
                Err(connection) => {
                    tracing::warn!("Bridge disposed while bootstrapping, discarding");
                    connection.close().await;
                    let err = BridgeError::Disposed;
                    self.shared.abort(generation, &err);
                    guard.disarm();
                    Err(err)
                }
            },
            Err(err) => {
                tracing::warn!("Bootstrap via {} failed: {err}", self.descriptor);
                self.shared.abort(generation, &err);
                guard.disarm();
                Err(err)
            }
        }
    }

    /// Drop the cached connection and dispose its bridge. Later disposal
    /// notifications from that bridge are ignored.
    pub async fn disconnect(&self) {
        let _gate = self.gate.lock().await;
        let connection = {
            let mut slot = self.shared.slot();
            slot.generation += 1;
            slot.state = CacheState::Empty;
            slot.connection.take()
        };

        if let Some(connection) = connection {
            tracing::info!("Disconnecting from {}", self.descriptor);
            connection.close().await;
        }
        self.shared.status.set(ConnectionStatus::Disconnected);
    }
}
