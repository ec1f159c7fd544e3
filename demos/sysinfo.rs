//! Sysinfo - query a device and print its system information.
//!
//! This example demonstrates:
//! - Creating a `DeviceConnection` with a custom configuration
//! - Sending a command and receiving the decoded JSON reply
//! - Addressing individual sockets of a power strip
//!
//! # Running
//!
//! ```text
//! cargo run --example sysinfo -- 10.0.0.25
//! ```
//!
//! Without an address, a local mock device is started and queried instead.

use std::time::Duration;

use kasa_transport::config::with_default_port;
use kasa_transport::mock::MockDevice;
use kasa_transport::{command, ConnectionConfig, DeviceConnection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mock;
    let addr = match std::env::args().nth(1) {
        Some(host) => with_default_port(&host),
        None => {
            mock = MockDevice::start().await?;
            mock.address()
        }
    };

    let config = ConnectionConfig::new().exchange_timeout(Duration::from_secs(3));
    let mut plug = DeviceConnection::with_config(addr, config);

    let sysinfo = plug.exchange(command::GET_SYSINFO).await?;
    let value: serde_json::Value = serde_json::from_str(&sysinfo)?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    let device_id = value["system"]["get_sysinfo"]["deviceId"]
        .as_str()
        .unwrap_or_default();
    if !device_id.is_empty() {
        let realtime = command::child_command(device_id, &[0], command::EMETER_REALTIME)?;
        println!("{}", plug.exchange(&realtime).await?);
    }

    Ok(())
}
