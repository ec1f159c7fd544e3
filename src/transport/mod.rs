//! Transport module - TCP connection handling.
//!
//! Provides:
//! - [`DeviceConnection`]: one socket, one request in flight, lazy dial
//! - [`SharedConnection`]: the same behind a mutex for use from many tasks

mod connection;
mod shared;

pub use connection::DeviceConnection;
pub use shared::SharedConnection;
