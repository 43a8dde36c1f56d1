use std::{collections::HashSet, fmt::Display, str::FromStr};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_aquisition::core::ObjectId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid MAC address: {0}")]
pub struct MacParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Builds a MAC from the trailing 6 sub-identifiers of a table OID, where each
    /// sub-identifier carries one octet in decimal (FDB and ONU tables index rows this way).
    pub fn from_oid_suffix(oid: &ObjectId) -> Option<Self> {
        let suffix = oid.suffix(6)?;
        let mut octets = [0u8; 6];
        for (slot, sub_id) in octets.iter_mut().zip(suffix) {
            *slot = u8::try_from(*sub_id).ok()?;
        }
        Some(Self(octets))
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `88:90:09:FE:C4:6D`, `88-90-09-fe-c4-6d` and `8890.09fe.c46d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().chars().filter(|c| !matches!(c, ':' | '-' | '.')).collect();
        let bytes = hex::decode(&digits).map_err(|_| MacParseError(s.to_string()))?;
        let octets: [u8; 6] = bytes.try_into().map_err(|_| MacParseError(s.to_string()))?;
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Forwarding database view: port index -> MACs learned on that port.
/// Both levels keep walk order, uplink detection depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacTable {
    ports: IndexMap<u32, IndexSet<MacAddress>>,
}

impl MacTable {
    pub fn insert(&mut self, port: u32, mac: MacAddress) {
        self.ports.entry(port).or_default().insert(mac);
    }

    pub fn get(&self, port: u32) -> Option<&IndexSet<MacAddress>> {
        self.ports.get(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &IndexSet<MacAddress>)> {
        self.ports.iter().map(|(port, macs)| (*port, macs))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// First port, in enumeration order, that learned any of `core_macs`.
    pub fn first_port_with_any(&self, core_macs: &HashSet<MacAddress>) -> Option<u32> {
        self.iter()
            .find(|(_, macs)| macs.iter().any(|mac| core_macs.contains(mac)))
            .map(|(port, _)| port)
    }
}

impl FromIterator<(u32, MacAddress)> for MacTable {
    fn from_iter<T: IntoIterator<Item = (u32, MacAddress)>>(iter: T) -> Self {
        let mut table = MacTable::default();
        for (port, mac) in iter {
            table.insert(port, mac);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_from_oid_suffix_formats_uppercase() {
        let oid: ObjectId = "1.3.6.1.2.1.17.7.1.2.2.1.2.111.136.144.9.254.196.109".parse().unwrap();
        let mac = MacAddress::from_oid_suffix(&oid).unwrap();
        assert_eq!(mac.to_string(), "88:90:09:FE:C4:6D");
    }

    #[test]
    fn test_mac_from_oid_suffix_rejects_out_of_range_octet() {
        let oid: ObjectId = "1.3.6.1.1.2.3.4.5.256".parse().unwrap();
        assert_eq!(MacAddress::from_oid_suffix(&oid), None);
        let short: ObjectId = "1.2.3".parse().unwrap();
        assert_eq!(MacAddress::from_oid_suffix(&short), None);
    }

    #[test]
    fn test_mac_parse_formats() {
        let expected = MacAddress::new([0x88, 0x90, 0x09, 0xFE, 0xC4, 0x6D]);
        assert_eq!("88:90:09:FE:C4:6D".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("88-90-09-fe-c4-6d".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("8890.09fe.c46d".parse::<MacAddress>().unwrap(), expected);
        assert!("88:90:09".parse::<MacAddress>().is_err());
        assert!("zz:90:09:FE:C4:6D".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_first_port_with_any_follows_enumeration_order() {
        let core = MacAddress::new([0x88, 0x90, 0x09, 0xFE, 0xC4, 0x6D]);
        let other = MacAddress::new([0, 1, 2, 3, 4, 5]);
        let table: MacTable = [(26, other), (28, core), (25, core)].into_iter().collect();

        assert_eq!(table.first_port_with_any(&HashSet::from([core])), Some(28));
        assert_eq!(table.first_port_with_any(&HashSet::new()), None);
        assert_eq!(table.get(26).map(|macs| macs.len()), Some(1));
    }
}
