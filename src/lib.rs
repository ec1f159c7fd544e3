//! # kasa-transport
//!
//! Client transport for the TP-Link Kasa smart-plug local protocol.
//!
//! Devices listen on TCP port 9999. Every request and response is a
//! 4-byte big-endian payload length followed by the payload, obfuscated
//! with an autokey XOR stream. The payload itself is a JSON document this
//! crate does not interpret.
//!
//! ## Architecture
//!
//! - **Protocol**: cipher, length prefix, growable accumulator and the
//!   incremental reader that assembles a frame from partial reads
//! - **Transport**: `DeviceConnection` (lazy dial, one deadline per
//!   exchange, socket dropped after each exchange by default)
//!
//! ## Example
//!
//! ```ignore
//! use kasa_transport::{command, ConnectionConfig, DeviceConnection};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> kasa_transport::Result<()> {
//!     let config = ConnectionConfig::new().exchange_timeout(Duration::from_secs(3));
//!     let mut plug = DeviceConnection::with_config("10.0.0.25:9999", config);
//!
//!     let sysinfo = plug.exchange(command::GET_SYSINFO).await?;
//!     println!("{}", sysinfo);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod transport;

pub use config::ConnectionConfig;
pub use error::{KasaError, Result};
pub use transport::{DeviceConnection, SharedConnection};
