//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The listener side captures the request URI during the upgrade handshake
//! so the accept callback can inspect the query string; the client side is
//! used for the broker's outbound link to the game-data userdata service.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, QueryParams, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket [`Transport`] listening on one TCP endpoint.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds a new listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "websocket listener bound");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketListener {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<(Self::Connection, QueryParams), Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        // The query string is only visible during the HTTP upgrade, so it
        // has to be captured from inside the handshake callback.
        let mut raw_query: Option<String> = None;
        let callback = |req: &Request, resp: Response| {
            raw_query = req.uri().query().map(str::to_string);
            Ok(resp)
        };
        let ws = tokio_tungstenite::accept_hdr_async(MaybeTlsStream::Plain(stream), callback)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let conn = WebSocketConnection::new(ws);
        tracing::debug!(id = %conn.id(), %addr, "accepted websocket connection");
        Ok((conn, QueryParams::parse(raw_query.as_deref())))
    }
}

/// Opens an outbound WebSocket connection to `url`.
pub async fn connect(url: &str) -> Result<WebSocketConnection, TransportError> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    let conn = WebSocketConnection::new(ws);
    tracing::debug!(id = %conn.id(), url, "websocket connected");
    Ok(conn)
}

/// A single WebSocket connection.
///
/// The stream is split so a receive blocked in the read pump never delays a
/// concurrent send; each half has its own lock.
pub struct WebSocketConnection {
    id: ConnectionId,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(ws: WsStream) -> Self {
        let (writer, reader) = ws.split();
        Self {
            id: ConnectionId::next(),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = Message::Binary(data.to_vec().into());
        self.writer.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
