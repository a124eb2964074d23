//! The provider-side TCP server.
//!
//! One tokio task per connection drives a [`StreamFramer`] over the
//! socket; each complete request frame spawns its own task, so slow
//! handlers never block later requests on the same connection and
//! responses may leave out of order. The correlation id carried in each
//! header keeps them matchable on the consumer side. The write half sits
//! behind a mutex so concurrent responses interleave per frame, never
//! within one.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use wirerpc_common::codec;
use wirerpc_common::framer::StreamFramer;
use wirerpc_common::protocol::{Header, Message, MessageBody, Result, RpcError, RpcRequest};
use wirerpc_common::serializer::SerializerRegistry;

use crate::dispatcher::Dispatcher;

const READ_CHUNK: usize = 4096;

/// Serves the wire protocol for one [`Dispatcher`].
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
    serializers: Arc<SerializerRegistry>,
}

impl RpcServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        RpcServer {
            dispatcher,
            serializers: Arc::new(SerializerRegistry::default()),
        }
    }

    /// Binds `addr` and serves until the task is dropped.
    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "rpc server listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "connection accepted");

            let dispatcher = Arc::clone(&self.dispatcher);
            let serializers = Arc::clone(&self.serializers);
            tokio::spawn(async move {
                match serve_connection(stream, dispatcher, serializers).await {
                    Ok(()) => debug!(%peer, "connection closed"),
                    // Protocol violations drop the connection; the framer
                    // state is not trustworthy past a corrupt frame.
                    Err(e) => debug!(%peer, error = %e, "connection dropped"),
                }
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    serializers: Arc<SerializerRegistry>,
) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let mut framer = StreamFramer::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }

        for frame in framer.push(&chunk[..n])? {
            let message = codec::decode(&frame, &serializers)?;
            let MessageBody::Request(request) = message.body else {
                return Err(RpcError::Connection(
                    "peer sent a non-request message".to_string(),
                ));
            };

            tokio::spawn(handle_request(
                message.header,
                request,
                Arc::clone(&dispatcher),
                Arc::clone(&serializers),
                Arc::clone(&writer),
            ));
        }
    }
}

async fn handle_request(
    header: Header,
    request: RpcRequest,
    dispatcher: Arc<Dispatcher>,
    serializers: Arc<SerializerRegistry>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
) {
    let response = dispatcher.dispatch(&request);
    let reply = Message::response_to(&header, response);

    match codec::encode(&reply, &serializers) {
        Ok(bytes) => {
            let mut writer = writer.lock().await;
            if let Err(e) = writer.write_all(&bytes).await {
                debug!(
                    correlation_id = header.correlation_id,
                    error = %e,
                    "failed to write response"
                );
            }
        }
        Err(e) => error!(
            correlation_id = header.correlation_id,
            error = %e,
            "failed to encode response"
        ),
    }
}
