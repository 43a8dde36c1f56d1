use std::{net::{IpAddr, SocketAddr}, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use snmp2::{AsyncSession, Oid};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use super::core::{
    ObjectId, SnmpTransport, SnmpValue, TransportConnector, TransportError, TransportResult, VarBind,
};
use crate::{
    config::duration_str,
    network::device::{DeviceIdentity, SnmpVersion},
};

/// Transport tuning shared by every session of one traversal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnmpSettings {
    pub port: u16,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Extra attempts after the first one timed out.
    pub retries: u32,
    #[serde(with = "duration_str")]
    pub retry_backoff: Duration,
    pub max_repetitions: u32,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            port: 161,
            timeout: Duration::from_secs(2),
            retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_repetitions: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Get,
    GetNext,
    GetBulk,
}

/// The error-status field of a response PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorStatus {
    NoError,
    /// SNMPv1 agents answer a missing object or the end of the MIB view this way.
    NoSuchName,
    Failed(u32),
}

impl ErrorStatus {
    fn from_code(code: u32) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            2 => ErrorStatus::NoSuchName,
            other => ErrorStatus::Failed(other),
        }
    }
}

fn error_status_name(code: u32) -> &'static str {
    match code {
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknown error",
    }
}

/// SNMP client for retrieving data from a single network device.
pub struct SnmpClient {
    address: SocketAddr,
    community: String,
    snmp_version: SnmpVersion,
    settings: SnmpSettings,
    /// Boxed: the session carries its send and receive buffers inline.
    session: Mutex<Option<Box<AsyncSession>>>,
}

impl SnmpClient {
    pub fn new(identity: &DeviceIdentity, settings: SnmpSettings) -> Self {
        Self {
            address: SocketAddr::new(identity.address, settings.port),
            community: identity.credentials.community.clone(),
            snmp_version: identity.credentials.version,
            settings,
            session: Mutex::new(None),
        }
    }

    async fn open_session(&self) -> TransportResult<Box<AsyncSession>> {
        let req_id = rand::rng().random_range(1..i32::MAX);
        let session = match self.snmp_version {
            SnmpVersion::V1 => AsyncSession::new_v1(self.address, self.community.as_bytes(), req_id).await,
            SnmpVersion::V2c => AsyncSession::new_v2c(self.address, self.community.as_bytes(), req_id).await,
        };
        session.map(Box::new).map_err(|source| TransportError::Io {
            address: self.address.ip(),
            source,
        })
    }

    /// SNMPv1 has no GETBULK; bulk walks fall back to GETNEXT there.
    fn bulk_operation(&self) -> Operation {
        match self.snmp_version {
            SnmpVersion::V1 => Operation::GetNext,
            SnmpVersion::V2c => Operation::GetBulk,
        }
    }

    fn to_snmp_oid(&self, oid: &ObjectId) -> TransportResult<Oid<'static>> {
        Oid::from(oid.components()).map_err(|_| TransportError::InvalidOid(oid.to_string()))
    }

    /// Runs one request/response exchange, retrying timeouts with a fixed backoff.
    async fn exchange(&self, operation: Operation, oid: &ObjectId) -> TransportResult<Vec<VarBind>> {
        let request_oid = self.to_snmp_oid(oid)?;
        let attempts = self.settings.retries + 1;
        let mut guard = self.session.lock().await;

        for attempt in 1..=attempts {
            if guard.is_none() {
                *guard = Some(self.open_session().await?);
            }
            let Some(session) = guard.as_mut() else {
                continue;
            };

            let response = match operation {
                Operation::Get => tokio::time::timeout(self.settings.timeout, session.get(&request_oid)).await,
                Operation::GetNext => {
                    tokio::time::timeout(self.settings.timeout, session.getnext(&request_oid)).await
                }
                Operation::GetBulk => {
                    tokio::time::timeout(
                        self.settings.timeout,
                        session.getbulk(&[&request_oid], 0, self.settings.max_repetitions),
                    )
                    .await
                }
            };

            match response {
                Ok(Ok(pdu)) => {
                    match ErrorStatus::from_code(pdu.error_status) {
                        ErrorStatus::NoError => {}
                        ErrorStatus::NoSuchName => {
                            trace!(address = %self.address.ip(), %oid, "noSuchName");
                            return Ok(Vec::new());
                        }
                        ErrorStatus::Failed(code) => {
                            return Err(TransportError::Protocol {
                                address: self.address.ip(),
                                message: format!(
                                    "{} (error-status {code}, index {})",
                                    error_status_name(code),
                                    pdu.error_index
                                ),
                            });
                        }
                    }
                    let mut varbinds = Vec::new();
                    for (oid, value) in pdu.varbinds {
                        let components: Vec<u64> = oid
                            .iter()
                            .ok_or_else(|| TransportError::InvalidOid(format!("{oid}")))?
                            .collect();
                        varbinds.push(VarBind {
                            oid: ObjectId::new(components),
                            value: SnmpValue::from(&value),
                        });
                    }
                    return Ok(varbinds);
                }
                Ok(Err(e)) => {
                    return Err(TransportError::Protocol {
                        address: self.address.ip(),
                        message: format!("{e:?}"),
                    });
                }
                Err(_elapsed) => {
                    warn!(address = %self.address.ip(), %oid, attempt, attempts, "snmp request timed out");
                    // A late reply would desynchronise request ids, start over with a fresh socket.
                    *guard = None;
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_backoff).await;
                    }
                }
            }
        }

        Err(TransportError::Timeout {
            address: self.address.ip(),
            attempts,
        })
    }

    async fn walk_with(&self, operation: Operation, prefix: &ObjectId) -> TransportResult<Vec<VarBind>> {
        let mut out = Vec::new();
        let mut cursor = prefix.clone();

        'walk: loop {
            let varbinds = self.exchange(operation, &cursor).await?;
            if varbinds.is_empty() {
                break;
            }
            for varbind in varbinds {
                if varbind.value.is_absent() || !varbind.oid.starts_with(prefix) {
                    break 'walk;
                }
                // Agents with broken lexicographic ordering would otherwise loop forever.
                if varbind.oid <= cursor {
                    debug!(address = %self.address.ip(), oid = %varbind.oid, "non-increasing oid, stopping walk");
                    break 'walk;
                }
                cursor = varbind.oid.clone();
                out.push(varbind);
            }
        }

        trace!(address = %self.address.ip(), %prefix, entries = out.len(), "walk finished");
        Ok(out)
    }
}

#[async_trait]
impl SnmpTransport for SnmpClient {
    fn address(&self) -> IpAddr {
        self.address.ip()
    }

    async fn get(&self, oid: &ObjectId) -> TransportResult<SnmpValue> {
        let varbinds = self.exchange(Operation::Get, oid).await?;
        Ok(varbinds
            .into_iter()
            .next()
            .map(|varbind| varbind.value)
            .unwrap_or(SnmpValue::Absent))
    }

    async fn walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>> {
        self.walk_with(Operation::GetNext, prefix).await
    }

    async fn bulk_walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>> {
        self.walk_with(self.bulk_operation(), prefix).await
    }
}

/// Opens one `SnmpClient` per device; the session itself is created lazily.
#[derive(Debug, Clone, Default)]
pub struct SnmpConnector {
    settings: SnmpSettings,
}

impl SnmpConnector {
    pub fn new(settings: SnmpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TransportConnector for SnmpConnector {
    async fn connect(&self, identity: &DeviceIdentity) -> TransportResult<Arc<dyn SnmpTransport>> {
        Ok(Arc::new(SnmpClient::new(identity, self.settings.clone())))
    }
}
