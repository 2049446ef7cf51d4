//! TCP transport: the `socket,host=…,port=…` connection kind.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::capability::{Channel, TransportConnector};
use crate::descriptor::TransportSpec;
use crate::error::{BridgeError, Result};

/// Opens [`SocketChannel`]s for `socket` transport specs.
///
/// Recognised parameters: `host` (default `localhost`), `port` (required)
/// and `tcpNoDelay` (`1` to disable Nagle).
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketConnector;

impl SocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for SocketConnector {
    async fn connect(&self, transport_spec: &str) -> Result<Arc<dyn Channel>> {
        let spec = TransportSpec::parse(transport_spec)?;
        let connect_err = |message: String| BridgeError::Connect {
            transport: transport_spec.to_string(),
            message,
        };

        if spec.kind != "socket" {
            return Err(connect_err(format!(
                "unsupported transport kind `{}`",
                spec.kind
            )));
        }
        let host = spec.get("host").unwrap_or("localhost");
        let port: u16 = spec
            .get("port")
            .ok_or_else(|| connect_err("missing `port` parameter".into()))?
            .parse()
            .map_err(|_| connect_err("`port` is not a valid port number".into()))?;

        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| connect_err(format!("failed to connect to {addr}: {e}")))?;

        if spec.get("tcpnodelay") == Some("1") {
            stream.set_nodelay(true)?;
        }

        let channel = SocketChannel::new(stream)?;
        tracing::debug!("Opened {}", channel.description());
        Ok(Arc::new(channel))
    }
}

/// A channel over a TCP stream.
///
/// Reads and writes use separate halves, so a pending read does not block
/// writers.
pub struct SocketChannel {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    local: SocketAddr,
    peer: SocketAddr,
}

impl SocketChannel {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            local,
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Channel for SocketChannel {
    fn description(&self) -> String {
        format!(
            "socket,host={},port={},peerHost={},peerPort={}",
            self.local.ip(),
            self.local.port(),
            self.peer.ip(),
            self.peer.port()
        )
    }

    async fn read(&self, len: usize) -> Result<Bytes> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(BridgeError::ConnectionClosed)?;

        let mut buf = BytesMut::zeroed(len);
        let mut filled = 0;
        while filled < len {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        tracing::trace!("Read {filled}/{len} bytes from {}", self.peer);
        Ok(buf.freeze())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BridgeError::ConnectionClosed)?;
        writer.write_all(data).await?;
        tracing::trace!("Wrote {} bytes to {}", data.len(), self.peer);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BridgeError::ConnectionClosed)?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            tracing::debug!("Closing {}", self.description());
            // The peer may already be gone; shutting down is best effort.
            if let Err(e) = writer.shutdown().await {
                tracing::trace!("Shutdown of {} failed: {e}", self.peer);
            }
        }
        self.reader.lock().await.take();
        Ok(())
    }
}
