//! Connection descriptor parsing.
//!
//! A connection descriptor names how and where to reach the remote office
//! process, in the same form the office accepts on its `--accept` switch,
//! prefixed with a scheme:
//!
//! ```text
//! uno:socket,host=localhost,port=2002;urp;StarOffice.ServiceManager
//! └┬┘ └──────────┬──────────────────┘ └┬┘ └─────────┬────────────┘
//! scheme    transport spec        protocol    root object id
//! ```
//!
//! Everything after the second `;` is the root object id, verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Scheme used when none is configured.
pub const DEFAULT_SCHEME: &str = "uno";

/// A parsed connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub scheme: String,
    /// Connection part handed to the transport connector,
    /// e.g. `socket,host=localhost,port=2002`.
    pub transport_spec: String,
    /// Protocol the bridge speaks over the channel, e.g. `urp`.
    pub protocol_name: String,
    /// Name under which the remote process exports its root object.
    pub root_object_id: String,
}

impl ConnectionDescriptor {
    /// Parse a descriptor using the [`DEFAULT_SCHEME`].
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_with_scheme(raw, DEFAULT_SCHEME)
    }

    /// Parse a descriptor that must start with `<scheme>:`.
    pub fn parse_with_scheme(raw: &str, scheme: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix(scheme)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| BridgeError::malformed(raw, "missing scheme prefix"))?;

        let first = rest
            .find(';')
            .ok_or_else(|| BridgeError::malformed(raw, "expected two `;` separators"))?;
        // The second boundary is located and checked on its own.
        let second = rest[first + 1..]
            .find(';')
            .map(|i| first + 1 + i)
            .ok_or_else(|| BridgeError::malformed(raw, "expected two `;` separators"))?;

        let transport_spec = &rest[..first];
        let protocol_name = &rest[first + 1..second];
        let root_object_id = &rest[second + 1..];

        if transport_spec.is_empty() {
            return Err(BridgeError::malformed(raw, "empty transport spec"));
        }
        if protocol_name.is_empty() {
            return Err(BridgeError::malformed(raw, "empty protocol name"));
        }
        if root_object_id.is_empty() {
            return Err(BridgeError::malformed(raw, "empty root object id"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            transport_spec: transport_spec.to_string(),
            protocol_name: protocol_name.to_string(),
            root_object_id: root_object_id.to_string(),
        })
    }

    /// Parse the transport part into its kind and parameters.
    pub fn transport(&self) -> Result<TransportSpec> {
        TransportSpec::parse(&self.transport_spec)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{};{};{}",
            self.scheme, self.transport_spec, self.protocol_name, self.root_object_id
        )
    }
}

/// The transport part of a descriptor: a kind followed by `key=value` pairs.
///
/// `socket,host=localhost,port=2002` has kind `socket` and two parameters.
/// Keys are lower-cased; values are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSpec {
    pub kind: String,
    pub params: Vec<(String, String)>,
}

impl TransportSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut items = raw.split(',').map(str::trim);

        let kind = items.next().unwrap_or_default();
        if kind.is_empty() {
            return Err(BridgeError::malformed(raw, "empty transport kind"));
        }

        let mut params = Vec::new();
        for item in items {
            if item.is_empty() {
                continue;
            }
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| BridgeError::malformed(raw, "transport parameter without `=`"))?;
            params.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            params,
        })
    }

    /// Look up a parameter by (case-insensitive) key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}
