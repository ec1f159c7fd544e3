//! In-process mock device for tests and demos.
//!
//! Listens on `127.0.0.1:0`, reads request frames with the same
//! incremental reader the client uses, and writes encoded replies built
//! by a responder function. A connection is served until the client
//! closes it, so both per-exchange and keep-alive clients work.
//!
//! # Example
//!
//! ```no_run
//! use kasa_transport::mock::MockDevice;
//! use kasa_transport::{command, DeviceConnection};
//!
//! # async fn run() -> kasa_transport::Result<()> {
//! let device = MockDevice::start().await?;
//! let mut conn = DeviceConnection::new(device.address());
//! let reply = conn.exchange(command::RELAY_ON).await?;
//! assert!(reply.contains("err_code"));
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::command;
use crate::error::Result;
use crate::protocol::{build_frame, FrameReader, ReadStatus, DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE};

/// Reply for commands the default responder does not know.
pub const UNKNOWN_COMMAND_RESPONSE: &str = r#"{"system":{"error":1}}"#;

const SYSINFO_RESPONSE: &str = r#"{"system":{"get_sysinfo":{"sw_ver":"1.0.6 Build 180627 Rel.081000","hw_ver":"1.0","model":"HS300(US)","deviceId":"8006E92180ADBEA7B3E4820027152BE21ACC7D77","alias":"TP-LINK_Power Strip_14A9","mic_type":"IOT.SMARTPLUGSWITCH","mac":"B0:BE:76:80:14:A9","led_off":0,"children":[{"id":"8006E92180ADBEA7B3E4820027152BE21ACC7D7700","state":1,"alias":"Top Tank Light"},{"id":"8006E92180ADBEA7B3E4820027152BE21ACC7D7701","state":1,"alias":"Top Tank Heater"}],"child_num":2,"err_code":0}}}"#;
const RELAY_RESPONSE: &str = r#"{"system":{"set_relay_state":{"err_code":0}}}"#;
const LED_RESPONSE: &str = r#"{"system":{"set_led_off":{"err_code":0}}}"#;
const EMETER_RESPONSE: &str = r#"{"emeter":{"get_realtime":{"voltage_mv":121122,"current_ma":34,"power_mw":2079,"total_wh":3376,"err_code":0}}}"#;

/// Function that maps a decoded request to a plaintext reply.
pub type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How the mock reacts once it has read a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    /// Write the full reply.
    #[default]
    Respond,
    /// Write only the 4-byte length prefix of the reply, then close.
    TruncateAfterPrefix,
    /// Never reply; hold the socket until the client goes away.
    Silent,
}

/// Canned replies for the common commands; `context` is ignored.
pub fn default_responder(request: &str) -> String {
    let Ok(mut request) = serde_json::from_str::<Value>(request) else {
        return UNKNOWN_COMMAND_RESPONSE.to_string();
    };
    if let Some(object) = request.as_object_mut() {
        object.remove("context");
    }

    let table = [
        (command::GET_SYSINFO, SYSINFO_RESPONSE),
        (command::RELAY_ON, RELAY_RESPONSE),
        (command::RELAY_OFF, RELAY_RESPONSE),
        (command::LED_ON, LED_RESPONSE),
        (command::LED_OFF, LED_RESPONSE),
        (command::EMETER_REALTIME, EMETER_RESPONSE),
    ];

    table
        .iter()
        .find(|(cmd, _)| serde_json::from_str::<Value>(cmd).ok().as_ref() == Some(&request))
        .map(|(_, response)| response.to_string())
        .unwrap_or_else(|| UNKNOWN_COMMAND_RESPONSE.to_string())
}

/// Builder for a [`MockDevice`].
pub struct MockDeviceBuilder {
    responder: Responder,
    behavior: Behavior,
    chunk_size: Option<usize>,
    chunk_delay: Duration,
}

impl MockDeviceBuilder {
    /// Create a builder using [`default_responder`].
    pub fn new() -> Self {
        Self {
            responder: Arc::new(default_responder),
            behavior: Behavior::Respond,
            chunk_size: None,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Use a custom responder.
    pub fn responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Set the reaction to requests.
    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Write replies in pieces of at most `size` bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Pause between reply pieces.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Bind the listener and start accepting connections.
    pub async fn start(self) -> Result<MockDevice> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            responder: self.responder,
            behavior: self.behavior,
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            requests: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });

        tracing::debug!(%addr, behavior = ?self.behavior, "mock device listening");
        let task = tokio::spawn(accept_loop(listener, shared.clone()));

        Ok(MockDevice { addr, shared, task })
    }
}

impl Default for MockDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    responder: Responder,
    behavior: Behavior,
    chunk_size: Option<usize>,
    chunk_delay: Duration,
    requests: Mutex<Vec<String>>,
    connections: AtomicUsize,
}

/// A running mock device. The listener stops when this is dropped.
pub struct MockDevice {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl MockDevice {
    /// Create a builder.
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::new()
    }

    /// Start a mock with the default responder.
    pub async fn start() -> Result<Self> {
        MockDeviceBuilder::new().start().await
    }

    /// Bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bound address as `host:port`.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Decoded requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<String> {
        self.shared.requests.lock().await.clone()
    }

    /// Number of accepted connections.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::Acquire)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "mock device accept failed");
                return;
            }
        };
        shared.connections.fetch_add(1, Ordering::AcqRel);

        let shared = shared.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, &shared).await {
                tracing::warn!(%peer, error = %e, "mock connection ended with error");
            }
        });
    }
}

async fn serve_connection(mut stream: TcpStream, shared: &Shared) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut reader = FrameReader::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE);

    loop {
        let frame = match reader.read_from(&mut stream).await? {
            ReadStatus::Complete(frame) => frame,
            ReadStatus::Closed { .. } => return Ok(()),
        };
        let request = frame.decode_to_string()?;
        tracing::debug!(%request, "mock device received command");
        shared.requests.lock().await.push(request.clone());

        let response = (shared.responder)(&request);
        let wire = build_frame(response.as_bytes())?;

        match shared.behavior {
            Behavior::Respond => write_reply(&mut stream, &wire, shared).await?,
            Behavior::TruncateAfterPrefix => {
                stream.write_all(&wire[..PREFIX_SIZE]).await?;
                stream.shutdown().await?;
                return Ok(());
            }
            Behavior::Silent => {
                let mut drain = [0u8; 256];
                while stream.read(&mut drain).await? > 0 {}
                return Ok(());
            }
        }
    }
}

async fn write_reply(stream: &mut TcpStream, wire: &[u8], shared: &Shared) -> Result<()> {
    let Some(size) = shared.chunk_size else {
        stream.write_all(wire).await?;
        return Ok(());
    };

    for (i, piece) in wire.chunks(size).enumerate() {
        if i > 0 && !shared.chunk_delay.is_zero() {
            tokio::time::sleep(shared.chunk_delay).await;
        }
        stream.write_all(piece).await?;
        stream.flush().await?;
    }
    Ok(())
}
