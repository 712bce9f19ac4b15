//! In-memory connection pairs.
//!
//! The broker's state machine is exercised end to end by the test suites
//! without touching a socket: each side of a [`MemoryConnection::pair`]
//! implements [`Connection`], and frames written on one side come out of
//! `recv` on the other. This lives in the crate proper (not behind
//! `cfg(test)`) because every downstream crate's tests use it.

use tokio::sync::{mpsc, Mutex};

use crate::{Connection, ConnectionId, TransportError};

/// One side of an in-process duplex connection.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates a connected pair. Frames sent on one side are received on the
    /// other; closing either side ends the peer's `recv` with `Ok(None)`.
    pub fn pair() -> (MemoryConnection, MemoryConnection) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryConnection {
                id: ConnectionId::next(),
                tx: std::sync::Mutex::new(Some(a_tx)),
                rx: Mutex::new(a_rx),
            },
            MemoryConnection {
                id: ConnectionId::next(),
                tx: std::sync::Mutex::new(Some(b_tx)),
                rx: Mutex::new(b_rx),
            },
        )
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("locally closed".into()))?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer closed".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        // Also end the local read side so our own pump observes the close,
        // the way a websocket reader would see the Close frame it sent.
        self.rx.lock().await.close();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
