//! Async TCP transport for the client side of a call.
//!
//! One connection carries one call at a time: the transport connects,
//! writes the encoded request, then drives its own [`StreamFramer`] over
//! the socket until the response frame is complete. The response's
//! correlation id must match the request's; a mismatch means the peer is
//! confused and the call fails rather than returning someone else's
//! response.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec;
use crate::framer::StreamFramer;
use crate::protocol::error::{Result, RpcError};
use crate::protocol::message::Message;
use crate::serializer::SerializerRegistry;

/// Default timeout for connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 4096;

/// Async TCP transport. Cheap to clone through an `Arc`; holds the
/// serializer registry used for encoding and decoding.
pub struct TcpTransport {
    serializers: Arc<SerializerRegistry>,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(serializers: Arc<SerializerRegistry>) -> Self {
        TcpTransport {
            serializers,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Performs one network attempt: connect, send the request message,
    /// wait for its response message.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the connection cannot be established in time
    /// - `Connection` on socket failures or a peer that closes early
    /// - protocol errors from decoding a corrupt response
    /// - `CorrelationMismatch` if the response answers a different request
    pub async fn invoke(&self, addr: &str, message: &Message) -> Result<Message> {
        let connect = TcpStream::connect(addr);
        let mut stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| RpcError::Timeout(self.connect_timeout.as_millis() as u64))?
            .map_err(|e| RpcError::Connection(format!("failed to connect to {addr}: {e}")))?;

        tracing::debug!(
            addr,
            correlation_id = message.header.correlation_id,
            "sending request"
        );

        let encoded = codec::encode(message, &self.serializers)?;
        stream
            .write_all(&encoded)
            .await
            .map_err(|e| RpcError::Connection(format!("failed to send request: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| RpcError::Connection(format!("failed to flush request: {e}")))?;

        let frame = read_one_frame(&mut stream).await?;
        let reply = codec::decode(&frame, &self.serializers)?;

        if reply.header.correlation_id != message.header.correlation_id {
            return Err(RpcError::CorrelationMismatch {
                expected: message.header.correlation_id,
                actual: reply.header.correlation_id,
            });
        }

        Ok(reply)
    }
}

/// Reads from the socket until the framer emits one complete message.
async fn read_one_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut framer = StreamFramer::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| RpcError::Connection(format!("failed to read response: {e}")))?;
        if n == 0 {
            return Err(RpcError::Connection(
                "connection closed before response arrived".to_string(),
            ));
        }

        if let Some(frame) = framer.push(&chunk[..n])?.into_iter().next() {
            return Ok(frame);
        }
    }
}
