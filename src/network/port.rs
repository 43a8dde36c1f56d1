use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Up,
    Down,
}

impl PortStatus {
    /// ifOperStatus: `1` is up, everything else (down, testing, dormant, ...) counts as down.
    pub fn from_oper_status(value: i64) -> Self {
        if value == 1 { PortStatus::Up } else { PortStatus::Down }
    }
}

impl Display for PortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortStatus::Up => f.write_str("up"),
            PortStatus::Down => f.write_str("down"),
        }
    }
}

/// What a port is used for, derived from its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "role", content = "name")]
pub enum PortRole {
    Client,
    /// Downstream (or upstream) device; carries the raw description as its identifier.
    Neighbor(String),
    None,
}

impl PortRole {
    pub fn is_client(&self) -> bool {
        matches!(self, PortRole::Client)
    }

    pub fn neighbor_name(&self) -> Option<&str> {
        match self {
            PortRole::Neighbor(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for PortRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRole::Client => f.write_str("client"),
            PortRole::Neighbor(name) => write!(f, "neighbor({name})"),
            PortRole::None => f.write_str("-"),
        }
    }
}

pub const CLIENT_MARKER: &str = "client";

/// Classifies a raw port description.
///
/// The client marker wins over neighbor tokens; matching is case-insensitive.
pub fn classify(description: &str, neighbor_tokens: &[&str]) -> PortRole {
    let lowered = description.to_lowercase();
    if lowered.contains(CLIENT_MARKER) {
        PortRole::Client
    } else if neighbor_tokens.iter().any(|token| lowered.contains(token)) {
        PortRole::Neighbor(description.trim().to_string())
    } else {
        PortRole::None
    }
}

/// True if a neighbor identifier carries one of the markers that exclude it from auto-descent.
pub fn is_manual(name: &str, markers: &[String]) -> bool {
    let lowered = name.to_lowercase();
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}
