//! Shared handle that serializes access to one device connection.
//!
//! The protocol allows one request in flight per socket. Tasks that want
//! to share a device (for instance with `keep_alive` enabled) go through a
//! `tokio::sync::Mutex`, so exchanges queue rather than interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::connection::DeviceConnection;
use crate::error::Result;

/// Cloneable, task-safe wrapper around a [`DeviceConnection`].
#[derive(Debug, Clone)]
pub struct SharedConnection {
    addr: Arc<str>,
    inner: Arc<Mutex<DeviceConnection>>,
}

impl SharedConnection {
    /// Wrap a connection for sharing.
    pub fn new(connection: DeviceConnection) -> Self {
        Self {
            addr: Arc::from(connection.address()),
            inner: Arc::new(Mutex::new(connection)),
        }
    }

    /// Device address (`host:port`).
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// Run one exchange, waiting for any exchange already in flight.
    pub async fn exchange(&self, command: &str) -> Result<String> {
        self.inner.lock().await.exchange(command).await
    }

    /// Run one exchange with a deadline for this call only.
    ///
    /// The deadline starts once the lock is held, so time spent queued
    /// behind other tasks does not count against it.
    pub async fn exchange_with_timeout(
        &self,
        command: &str,
        deadline: Duration,
    ) -> Result<String> {
        self.inner
            .lock()
            .await
            .exchange_with_timeout(command, deadline)
            .await
    }

    /// Raw-payload variant of [`exchange`](Self::exchange).
    pub async fn exchange_bytes(&self, command: &[u8]) -> Result<Vec<u8>> {
        self.inner.lock().await.exchange_bytes(command).await
    }

    /// Close the underlying socket once any in-flight exchange finishes.
    pub async fn close(&self) {
        self.inner.lock().await.close().await;
    }

    /// Whether the underlying connection holds a socket.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_connected()
    }
}

impl From<DeviceConnection> for SharedConnection {
    fn from(connection: DeviceConnection) -> Self {
        Self::new(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clone_shares_connection() {
        let shared = SharedConnection::new(DeviceConnection::new("127.0.0.1:9999"));
        let other = shared.clone();

        assert_eq!(other.address(), "127.0.0.1:9999");
        assert!(Arc::ptr_eq(&shared.inner, &other.inner));
        assert!(!other.is_connected().await);

        shared.close().await;
        assert!(!other.is_connected().await);
    }
}
