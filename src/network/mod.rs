/*!
Protocol-neutral model of the access layer: device identities, ports and MAC tables.
*/

pub mod device;
pub mod mac;
pub mod port;
