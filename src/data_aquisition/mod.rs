/*
 * This module provides data aquisition abilites for the application.
 * It doesn't care what the values mean, just how they are fetched:
 * SNMP sessions, the transport seams the drivers consume, and host name resolution.
 */

pub mod core;
pub mod directory;
#[cfg(test)]
pub(crate) mod replay;
pub mod snmp;
