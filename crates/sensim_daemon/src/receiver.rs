//! A connected receiver: a write-only sink for one sensor's readings.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Registry-local handle used to log and remove a receiver.
pub type ReceiverId = u64;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("receiver already removed")]
    Closed,
    #[error("write did not complete within {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One connected peer. Generic over the stream so tests can stand in
/// in-memory or failing writers for sockets.
#[derive(Debug)]
pub struct Receiver<W = TcpStream> {
    id: ReceiverId,
    peer: SocketAddr,
    stream: Mutex<W>,
    closed: AtomicBool,
}

impl<W> Receiver<W> {
    pub(crate) fn new(id: ReceiverId, peer: SocketAddr, stream: W) -> Self {
        Self {
            id,
            peer,
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ReceiverId {
        self.id
    }

    /// Remote address, for diagnostics only.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// True once the receiver has been removed from its registry.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl<W: AsyncWrite + Unpin> Receiver<W> {
    /// Write `payload` in full and flush it, giving up after `timeout`.
    ///
    /// Refuses to write once the receiver has been removed, even when called
    /// through a snapshot taken before the removal.
    pub async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        let mut stream = self.stream.lock().await;
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        let write = async {
            stream.write_all(payload).await?;
            stream.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result.map_err(SendError::from),
            Err(_) => Err(SendError::TimedOut(timeout)),
        }
    }
}
