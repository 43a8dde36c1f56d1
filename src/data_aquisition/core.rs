use std::{fmt::Display, net::{IpAddr, Ipv4Addr}, str::FromStr, sync::Arc};

use async_trait::async_trait;
use snmp2::Value;
use thiserror::Error;

use crate::network::device::DeviceIdentity;

/// Owned, dotted-numeric object identifier.
///
/// snmp2's `Oid` borrows from the session buffer, so everything that leaves the
/// transport is converted into this type first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Vec<u64>);

impl ObjectId {
    pub fn new(components: Vec<u64>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &ObjectId) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Appends one sub-identifier, e.g. a port index to a column OID.
    pub fn child(&self, sub_id: u64) -> ObjectId {
        let mut components = self.0.clone();
        components.push(sub_id);
        ObjectId(components)
    }

    /// The trailing `n` sub-identifiers, or `None` if the OID is shorter.
    pub fn suffix(&self, n: usize) -> Option<&[u64]> {
        self.0.len().checked_sub(n).map(|start| &self.0[start..])
    }

    pub fn last(&self) -> Option<u64> {
        self.0.last().copied()
    }
}

impl FromStr for ObjectId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(TransportError::InvalidOid(s.to_string()));
        }
        trimmed
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| TransportError::InvalidOid(s.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(ObjectId)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

/// Replacement for the snmp2::Value type due to lifetime shenanigans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    /// Raw bytes; free text and binary structures (e.g. deregistration stamps) both arrive here.
    OctetString(Vec<u8>),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    /// noSuchObject / noSuchInstance / endOfMibView
    Absent,
    Unknown,
}

impl SnmpValue {
    /// Numeric view of the value. Octet strings holding decimal digits are
    /// accepted too, some agents report counters that way.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(i) => Some(*i),
            SnmpValue::Counter32(c) | SnmpValue::Unsigned32(c) | SnmpValue::Timeticks(c) => Some(i64::from(*c)),
            SnmpValue::Counter64(c) => i64::try_from(*c).ok(),
            SnmpValue::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
            SnmpValue::Integer(_) | SnmpValue::Counter32(_) | SnmpValue::Unsigned32(_)
            | SnmpValue::Timeticks(_) | SnmpValue::Counter64(_) => self.as_i64().map(|n| n.to_string()),
            SnmpValue::IpAddress(ip) => Some(ip.to_string()),
            SnmpValue::Absent | SnmpValue::Unknown => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SnmpValue::Absent)
    }
}

impl From<&Value<'_>> for SnmpValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(i) => SnmpValue::Integer(*i),
            Value::IpAddress(ip) => SnmpValue::IpAddress(Ipv4Addr::from(*ip)),
            Value::OctetString(s) => SnmpValue::OctetString(s.to_vec()),
            Value::Counter32(c) => SnmpValue::Counter32(*c),
            Value::Timeticks(t) => SnmpValue::Timeticks(*t),
            Value::Unsigned32(u) => SnmpValue::Unsigned32(*u),
            Value::Counter64(c) => SnmpValue::Counter64(*c),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => SnmpValue::Absent,
            _ => SnmpValue::Unknown,
        }
    }
}

/// One (object id, value) pair returned by a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: ObjectId,
    pub value: SnmpValue,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{address}: no response after {attempts} attempt(s)")]
    Timeout { address: IpAddr, attempts: u32 },
    #[error("{address}: protocol error: {message}")]
    Protocol { address: IpAddr, message: String },
    #[error("{address}: io error: {source}")]
    Io {
        address: IpAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid object identifier: {0}")]
    InvalidOid(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// A session bound to one device address and credential.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    fn address(&self) -> IpAddr;

    /// Single-value fetch. Missing instances come back as `SnmpValue::Absent`.
    async fn get(&self, oid: &ObjectId) -> TransportResult<SnmpValue>;

    /// Ordered subtree enumeration (GETNEXT).
    async fn walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>>;

    /// Same semantics as `walk`, optimised for large subtrees (GETBULK).
    async fn bulk_walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>>;
}

/// Opens transport sessions for device identities.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, identity: &DeviceIdentity) -> TransportResult<Arc<dyn SnmpTransport>>;
}
