//! TCP connection to a single device.
//!
//! One request is in flight at a time: `exchange` takes `&mut self`, writes
//! one frame and reads one frame back under a single deadline. By default
//! the socket is dropped at the end of every exchange so that a later call
//! never races with a half-closed handle.
//!
//! # Example
//!
//! ```no_run
//! use kasa_transport::{command, DeviceConnection};
//!
//! # async fn run() -> kasa_transport::Result<()> {
//! let mut plug = DeviceConnection::new("10.0.0.25:9999");
//! let sysinfo = plug.exchange(command::GET_SYSINFO).await?;
//! println!("{}", sysinfo);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ConnectionConfig;
use crate::error::{KasaError, Result};
use crate::protocol::{build_frame, read_frame, Frame};

/// Connection to one device.
///
/// A socket is only stored between calls after a successful keep-alive
/// exchange. Errors and dropped exchange futures both release it, so the
/// next call redials instead of reusing a dead or half-read handle.
#[derive(Debug)]
pub struct DeviceConnection {
    addr: String,
    config: ConnectionConfig,
    stream: Option<TcpStream>,
}

impl DeviceConnection {
    /// Create a connection with default settings. Nothing is dialed yet.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_config(addr, ConnectionConfig::default())
    }

    /// Create a connection with custom settings. Nothing is dialed yet.
    pub fn with_config(addr: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
            stream: None,
        }
    }

    /// Device address (`host:port`).
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// Active configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether a socket is currently held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Dial the device if no socket is held.
    ///
    /// # Errors
    ///
    /// Returns `Connect` if the dial fails or exceeds the dial timeout.
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_none() {
            self.stream = Some(self.dial().await?);
        }
        Ok(())
    }

    /// Send a JSON command and return the decoded JSON response.
    ///
    /// # Errors
    ///
    /// See [`exchange_bytes`](Self::exchange_bytes); additionally
    /// `InvalidUtf8` if the decoded response is not UTF-8.
    pub async fn exchange(&mut self, command: &str) -> Result<String> {
        let deadline = self.config.exchange_timeout;
        self.exchange_with_timeout(command, deadline).await
    }

    /// Like [`exchange`](Self::exchange) with a deadline for this call only.
    pub async fn exchange_with_timeout(
        &mut self,
        command: &str,
        deadline: Duration,
    ) -> Result<String> {
        let response = self
            .exchange_bytes_with_timeout(command.as_bytes(), deadline)
            .await?;
        Ok(String::from_utf8(response)?)
    }

    /// Send a raw plaintext payload and return the decoded response payload.
    ///
    /// Dials lazily. The write and the whole response read share one
    /// deadline, so a peer trickling bytes cannot stretch the wait.
    ///
    /// # Errors
    ///
    /// - `Connect` if the dial fails
    /// - `Write` if the request cannot be written
    /// - `ReadTimeout` if the deadline passes first
    /// - `ConnectionClosed` if the device closes mid-frame
    /// - `MalformedLength` / `AllocationTooLarge` on a corrupt length prefix
    pub async fn exchange_bytes(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let deadline = self.config.exchange_timeout;
        self.exchange_bytes_with_timeout(command, deadline).await
    }

    /// Like [`exchange_bytes`](Self::exchange_bytes) with a deadline for this call only.
    ///
    /// The socket is moved out of `self` for the duration of the exchange.
    /// If the future is dropped midway, the socket goes with it and the
    /// next call dials a fresh one instead of reading a stale reply.
    pub async fn exchange_bytes_with_timeout(
        &mut self,
        command: &[u8],
        deadline: Duration,
    ) -> Result<Vec<u8>> {
        let wire = build_frame(command)?;
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.dial().await?,
        };

        match round_trip(&mut stream, &wire, deadline, self.config.max_payload_size).await {
            Ok(frame) => {
                tracing::debug!(
                    addr = %self.addr,
                    request_len = command.len(),
                    response_len = frame.payload_length,
                    "exchange complete"
                );
                if self.config.keep_alive {
                    self.stream = Some(stream);
                } else {
                    shutdown(stream).await;
                }
                Ok(frame.into_plaintext())
            }
            Err(e) => {
                tracing::debug!(addr = %self.addr, error = %e, "exchange failed, dropping socket");
                shutdown(stream).await;
                Err(e)
            }
        }
    }

    /// Close the socket if one is held. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            shutdown(stream).await;
        }
    }

    async fn dial(&self) -> Result<TcpStream> {
        tracing::debug!(addr = %self.addr, "dialing device");

        let dialed =
            tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(&self.addr)).await;
        let stream = match dialed {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(KasaError::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(KasaError::Connect {
                    addr: self.addr.clone(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial timed out after {:?}", self.config.dial_timeout),
                    ),
                })
            }
        };

        // Frames are small and written in one call; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %self.addr, error = %e, "failed to set TCP_NODELAY");
        }
        Ok(stream)
    }
}

async fn round_trip(
    stream: &mut TcpStream,
    wire: &[u8],
    deadline: Duration,
    max_payload_size: u32,
) -> Result<Frame> {
    let exchange = async move {
        stream.write_all(wire).await.map_err(KasaError::Write)?;
        stream.flush().await.map_err(KasaError::Write)?;
        read_frame(stream, max_payload_size).await
    };

    match tokio::time::timeout(deadline, exchange).await {
        Ok(result) => result,
        Err(_) => Err(KasaError::ReadTimeout(deadline)),
    }
}

async fn shutdown(mut stream: TcpStream) {
    // The peer may already be gone; the socket is released either way.
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AutokeyCipher, DEFAULT_MAX_PAYLOAD_SIZE};
    use tokio::net::{TcpListener, TcpSocket};

    /// Accept one connection, read one frame, reply with `response`.
    async fn one_shot_device(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let frame = read_frame(&mut socket, DEFAULT_MAX_PAYLOAD_SIZE)
                .await
                .unwrap();
            assert!(!frame.decode().is_empty());
            socket
                .write_all(&build_frame(response.as_bytes()).unwrap())
                .await
                .unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_close_never_opened_is_noop() {
        let mut conn = DeviceConnection::new("127.0.0.1:9999");
        assert!(!conn.is_connected());

        conn.close().await;
        conn.close().await;
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_exchange_closes_socket_by_default() {
        let addr = one_shot_device(r#"{"system":{"error":0}}"#).await;
        let mut conn = DeviceConnection::new(addr);

        let response = conn.exchange(r#"{"system":{"get_sysinfo":{}}}"#).await.unwrap();
        assert_eq!(response, r#"{"system":{"error":0}}"#);
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_explicit_connect_then_exchange() {
        let addr = one_shot_device("{}").await;
        let mut conn = DeviceConnection::new(addr);

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        // A second connect keeps the same socket.
        conn.connect().await.unwrap();

        assert_eq!(conn.exchange("{}").await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_refused_dial_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut conn = DeviceConnection::with_config(
            addr.clone(),
            ConnectionConfig::new().dial_timeout(Duration::from_secs(2)),
        );
        let err = conn.exchange("{}").await.unwrap_err();

        assert!(matches!(err, KasaError::Connect { addr: ref a, .. } if *a == addr));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_dial_timeout_is_connect_timeout() {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        // Nothing accepts, so once the backlog fills further SYNs go unanswered.
        let mut backlog = Vec::new();
        for _ in 0..16 {
            match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => backlog.push(stream),
                _ => break,
            }
        }

        let mut conn = DeviceConnection::with_config(
            addr.to_string(),
            ConnectionConfig::new().dial_timeout(Duration::from_millis(100)),
        );
        let err = conn.exchange("{}").await.unwrap_err();

        assert!(matches!(err, KasaError::Connect { .. }), "got {:?}", err);
        assert!(err.is_timeout());
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_peer_reset_during_write_is_write_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut conn = DeviceConnection::with_config(
            addr,
            ConnectionConfig::new().exchange_timeout(Duration::from_secs(10)),
        );
        // Far more than loopback socket buffers hold, so the write sees the reset.
        let payload = vec![b'x'; 32 * 1024 * 1024];
        let err = conn.exchange_bytes(&payload).await.unwrap_err();

        assert!(matches!(err, KasaError::Write(_)), "got {:?}", err);
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut socket, DEFAULT_MAX_PAYLOAD_SIZE).await;
            let mut reply = 10_000u32.to_be_bytes().to_vec();
            reply.extend(AutokeyCipher::encode(&[b'x'; 64]));
            let _ = socket.write_all(&reply).await;
        });

        let mut conn = DeviceConnection::with_config(
            addr,
            ConnectionConfig::new().max_payload_size(1024),
        );
        let err = conn.exchange("{}").await.unwrap_err();

        assert!(matches!(
            err,
            KasaError::MalformedLength {
                declared: 10_000,
                max: 1024
            }
        ));
        assert!(!conn.is_connected());
    }
}
