//! Port traits: the boundaries between the domain and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod report_port;
