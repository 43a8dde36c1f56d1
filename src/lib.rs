pub mod config;
pub mod data_aquisition;
pub mod drivers;
pub mod network;
pub mod outage;
pub mod topology;
