//! Control-plane HTTP client

pub mod client;
pub mod control_plane;
pub mod registry;
pub mod uploads;
