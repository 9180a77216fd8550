//! Connection acceptor: one listener per sensor feeding its registry.

use crate::registry::ReceiverRegistry;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AcceptorError {
    #[error("sensor {sensor_id}: cannot listen on {addr}: {source}")]
    Bind {
        sensor_id: u16,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // Rebind even while old connections sit in TIME_WAIT
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Owns a sensor's listener and a handle to its registry.
pub struct Acceptor {
    sensor_id: u16,
    listener: TcpListener,
    registry: ReceiverRegistry,
    accept_retry: Duration,
}

impl Acceptor {
    /// Bind the sensor's listener. Failure here is fatal for this acceptor only.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        sensor_id: u16,
        addr: SocketAddr,
        backlog: u32,
        registry: ReceiverRegistry,
        accept_retry: Duration,
    ) -> Result<Self, AcceptorError> {
        let listener = listen(addr, backlog).map_err(|source| AcceptorError::Bind {
            sensor_id,
            addr,
            source,
        })?;

        Ok(Self {
            sensor_id,
            listener,
            registry,
            accept_retry,
        })
    }

    /// Address actually bound, which differs from the requested one for port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Accepted streams are never read from.
    pub async fn run(self) {
        info!(
            sensor_id = self.sensor_id,
            addr = ?self.listener.local_addr().ok(),
            "Sensor is waiting for receivers"
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(sensor_id = self.sensor_id, peer = %peer, error = %e, "Could not disable Nagle");
                    }
                    let receiver = self.registry.add(stream, peer);
                    info!(
                        sensor_id = self.sensor_id,
                        peer = %peer,
                        receiver_id = receiver.id(),
                        receivers = self.registry.len(),
                        "Got new connection"
                    );
                }
                Err(e) => {
                    // EMFILE and friends: back off and keep listening
                    warn!(sensor_id = self.sensor_id, error = %e, "Accept failed, retrying");
                    tokio::time::sleep(self.accept_retry).await;
                }
            }
        }
    }
}
