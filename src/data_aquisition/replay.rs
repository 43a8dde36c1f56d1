//! In-memory SNMP agents for tests, loaded from `snmpwalk -On` dumps.

use std::{
    collections::{BTreeMap, HashMap},
    net::IpAddr,
    sync::Arc,
};

use async_trait::async_trait;

use super::core::{
    ObjectId, SnmpTransport, SnmpValue, TransportConnector, TransportError, TransportResult, VarBind,
};
use crate::network::device::DeviceIdentity;

pub struct ReplayAgent {
    address: IpAddr,
    table: BTreeMap<ObjectId, SnmpValue>,
    silent: bool,
}

impl ReplayAgent {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            table: BTreeMap::new(),
            silent: false,
        }
    }

    /// An agent that never answers.
    pub fn silent(address: IpAddr) -> Self {
        Self {
            silent: true,
            ..Self::new(address)
        }
    }

    /// Parses lines like `.1.3.6.1.2.1.1.1.0 = STRING: "DES-3200-28"`.
    /// Lines that don't look like a varbind are skipped.
    pub fn from_dump(address: IpAddr, dump: &str) -> Self {
        let mut agent = Self::new(address);
        for line in dump.lines() {
            let Some((oid, rest)) = line.split_once(" = ") else {
                continue;
            };
            let Ok(oid) = oid.parse::<ObjectId>() else {
                continue;
            };
            agent.table.insert(oid, parse_value(rest));
        }
        agent
    }

    pub fn with(mut self, oid: &str, value: SnmpValue) -> Self {
        self.insert(oid, value);
        self
    }

    pub fn insert(&mut self, oid: &str, value: SnmpValue) {
        let oid = oid.parse().expect("test oid");
        self.table.insert(oid, value);
    }

    pub fn text(self, oid: &str, value: &str) -> Self {
        self.with(oid, SnmpValue::OctetString(value.as_bytes().to_vec()))
    }

    pub fn int(self, oid: &str, value: i64) -> Self {
        self.with(oid, SnmpValue::Integer(value))
    }

    fn check_alive(&self) -> TransportResult<()> {
        if self.silent {
            Err(TransportError::Timeout {
                address: self.address,
                attempts: 4,
            })
        } else {
            Ok(())
        }
    }
}

fn parse_value(rest: &str) -> SnmpValue {
    let (kind, raw) = rest.split_once(": ").unwrap_or(("STRING", rest));
    let raw = raw.trim();
    match kind {
        "STRING" => SnmpValue::OctetString(raw.trim_matches('"').as_bytes().to_vec()),
        "Hex-STRING" => hex::decode(raw.replace(' ', ""))
            .map(SnmpValue::OctetString)
            .unwrap_or(SnmpValue::Unknown),
        "INTEGER" => {
            // `up(1)` or plain `1`
            let numeric = raw
                .rsplit_once('(')
                .map(|(_, n)| n.trim_end_matches(')'))
                .unwrap_or(raw);
            numeric.parse().map(SnmpValue::Integer).unwrap_or(SnmpValue::Unknown)
        }
        "Gauge32" | "Unsigned32" => raw.parse().map(SnmpValue::Unsigned32).unwrap_or(SnmpValue::Unknown),
        "Counter32" => raw.parse().map(SnmpValue::Counter32).unwrap_or(SnmpValue::Unknown),
        "Counter64" => raw.parse().map(SnmpValue::Counter64).unwrap_or(SnmpValue::Unknown),
        "IpAddress" => raw.parse().map(SnmpValue::IpAddress).unwrap_or(SnmpValue::Unknown),
        _ => SnmpValue::Unknown,
    }
}

#[async_trait]
impl SnmpTransport for ReplayAgent {
    fn address(&self) -> IpAddr {
        self.address
    }

    async fn get(&self, oid: &ObjectId) -> TransportResult<SnmpValue> {
        self.check_alive()?;
        Ok(self.table.get(oid).cloned().unwrap_or(SnmpValue::Absent))
    }

    async fn walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>> {
        self.check_alive()?;
        Ok(self
            .table
            .range(prefix.clone()..)
            .take_while(|(oid, _)| oid.starts_with(prefix))
            .map(|(oid, value)| VarBind {
                oid: oid.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn bulk_walk(&self, prefix: &ObjectId) -> TransportResult<Vec<VarBind>> {
        self.walk(prefix).await
    }
}

/// A set of agents keyed by address. Unknown addresses behave like dead devices.
#[derive(Default)]
pub struct ReplayNetwork {
    agents: HashMap<IpAddr, Arc<ReplayAgent>>,
}

impl ReplayNetwork {
    pub fn add(&mut self, agent: ReplayAgent) {
        self.agents.insert(agent.address, Arc::new(agent));
    }
}

#[async_trait]
impl TransportConnector for ReplayNetwork {
    async fn connect(&self, identity: &DeviceIdentity) -> TransportResult<Arc<dyn SnmpTransport>> {
        match self.agents.get(&identity.address) {
            Some(agent) => Ok(agent.clone()),
            None => Ok(Arc::new(ReplayAgent::silent(identity.address))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_dump_lines() {
        let dump = r#"
.1.3.6.1.2.1.1.1.0 = STRING: "DES-3200-28 Fast Ethernet Switch"
.1.3.6.1.2.1.2.2.1.8.1 = INTEGER: up(1)
.1.3.6.1.2.1.2.2.1.8.2 = INTEGER: 2
.1.3.6.1.4.1.3320.1 = Hex-STRING: 07 E8 0A 10
garbage line
"#;
        let agent = ReplayAgent::from_dump("10.0.0.1".parse().unwrap(), dump);

        let descr = agent.get(&"1.3.6.1.2.1.1.1.0".parse().unwrap()).await.unwrap();
        assert_eq!(descr.as_text().as_deref(), Some("DES-3200-28 Fast Ethernet Switch"));

        let statuses = agent.walk(&"1.3.6.1.2.1.2.2.1.8".parse().unwrap()).await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].value, SnmpValue::Integer(1));

        let raw = agent.get(&"1.3.6.1.4.1.3320.1".parse().unwrap()).await.unwrap();
        assert_eq!(raw.as_bytes(), Some(&[0x07, 0xE8, 0x0A, 0x10][..]));
    }
}
