//! Receiver registry: the per-sensor set of connected receivers.
//!
//! The acceptor adds, the broadcaster snapshots and removes. The collection
//! sits behind a mutex that is only ever held to push, remove or clone
//! handles; no I/O or `.await` happens under it. Broadcasts iterate a
//! snapshot, so connects and disconnects never disturb a traversal in flight.

use crate::receiver::{Receiver, ReceiverId};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpStream;
use tracing::warn;

struct RegistryInner<W> {
    next_id: ReceiverId,
    receivers: Vec<Arc<Receiver<W>>>,
}

impl<W> Drop for RegistryInner<W> {
    fn drop(&mut self) {
        for receiver in self.receivers.drain(..) {
            receiver.mark_closed();
        }
    }
}

/// Cheaply clonable handle to one sensor's receivers.
pub struct ReceiverRegistry<W = TcpStream> {
    inner: Arc<Mutex<RegistryInner<W>>>,
}

impl<W> Clone for ReceiverRegistry<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> Default for ReceiverRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> ReceiverRegistry<W> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                receivers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner<W>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Receiver registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a newly accepted stream. It receives every broadcast whose
    /// snapshot is taken after this returns.
    pub fn add(&self, stream: W, peer: SocketAddr) -> Arc<Receiver<W>> {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let receiver = Arc::new(Receiver::new(id, peer, stream));
        inner.receivers.push(Arc::clone(&receiver));
        receiver
    }

    /// Remove `receiver` and mark it closed. Returns false if it was not
    /// registered (already removed, or from another registry).
    ///
    /// The stream itself is dropped, closing the connection, once the last
    /// snapshot holding it is released.
    pub fn remove(&self, receiver: &Receiver<W>) -> bool {
        let removed = {
            let mut inner = self.lock();
            let position = inner
                .receivers
                .iter()
                .position(|registered| std::ptr::eq(Arc::as_ptr(registered), receiver));
            position.map(|index| inner.receivers.remove(index))
        };

        match removed {
            Some(receiver) => {
                receiver.mark_closed();
                true
            }
            None => false,
        }
    }

    /// Receivers to write to for one broadcast cycle, in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<Receiver<W>>> {
        self.lock().receivers.clone()
    }

    pub fn contains(&self, id: ReceiverId) -> bool {
        self.lock().receivers.iter().any(|receiver| receiver.id() == id)
    }

    pub fn len(&self) -> usize {
        self.lock().receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every receiver, returning how many there were.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = self.lock().receivers.drain(..).collect();
        for receiver in &drained {
            receiver.mark_closed();
        }
        drained.len()
    }
}
