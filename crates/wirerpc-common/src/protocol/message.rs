use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::protocol::request::RpcRequest;
use crate::protocol::response::RpcResponse;

/// Fixed header length in bytes.
pub const HEADER_LENGTH: usize = 17;

/// Magic byte every message starts with. A mismatch means the stream is
/// corrupt or the peer is not speaking this protocol.
pub const PROTOCOL_MAGIC: u8 = 0x01;

/// Protocol version carried in every header.
pub const PROTOCOL_VERSION: u8 = 0x01;

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a correlation id that is unique per outstanding call.
///
/// Combines the current wall-clock nanoseconds (upper 32 bits) with a
/// process-wide counter (lower 32 bits), so ids stay unique even when many
/// calls start within the same nanosecond.
pub fn next_correlation_id() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let counter = CORRELATION_COUNTER.fetch_add(1, Ordering::SeqCst);

    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}

/// Message type discriminant carried at header offset 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Heartbeat,
    Other,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::Request => 0,
            MessageType::Response => 1,
            MessageType::Heartbeat => 2,
            MessageType::Other => 3,
        }
    }

    /// Maps a raw header byte back to a type; `None` for values outside the
    /// protocol's range.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MessageType::Request),
            1 => Some(MessageType::Response),
            2 => Some(MessageType::Heartbeat),
            3 => Some(MessageType::Other),
            _ => None,
        }
    }
}

/// Response status codes carried at header offset 4. Meaningless for
/// requests, which carry 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Ok,
    BadRequest,
    BadResponse,
}

impl MessageStatus {
    pub fn code(self) -> u8 {
        match self {
            MessageStatus::Ok => 20,
            MessageStatus::BadRequest => 40,
            MessageStatus::BadResponse => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            20 => Some(MessageStatus::Ok),
            40 => Some(MessageStatus::BadRequest),
            50 => Some(MessageStatus::BadResponse),
            _ => None,
        }
    }
}

/// Fixed-size message header.
///
/// Layout on the wire (all integers big-endian):
///
/// | offset | size | field          |
/// |--------|------|----------------|
/// | 0      | 1    | magic          |
/// | 1      | 1    | version        |
/// | 2      | 1    | serializer id  |
/// | 3      | 1    | message type   |
/// | 4      | 1    | status         |
/// | 5      | 8    | correlation id |
/// | 13     | 4    | body length    |
///
/// `body_length` is owned by the codec: it is written during encode from the
/// actual serialized body and populated during decode from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub version: u8,
    pub serializer: u8,
    pub message_type: MessageType,
    pub status: u8,
    pub correlation_id: u64,
    pub body_length: u32,
}

/// Typed message body, chosen by the header's type field.
///
/// Heartbeat and Other are valid header values but carry no body encoding,
/// so they never appear here; decoding one fails with
/// `UnsupportedMessageType`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Request(RpcRequest),
    Response(RpcResponse),
}

/// A complete protocol message: header plus typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    pub body: MessageBody,
}

impl Message {
    /// Builds a request message with a fresh correlation id.
    pub fn request(serializer: u8, request: RpcRequest) -> Self {
        Message {
            header: Header {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                serializer,
                message_type: MessageType::Request,
                status: 0,
                correlation_id: next_correlation_id(),
                body_length: 0,
            },
            body: MessageBody::Request(request),
        }
    }

    /// Builds the response message for a received request header.
    ///
    /// The correlation id and serializer are carried over unchanged so the
    /// caller can match the response to its request.
    pub fn response_to(request_header: &Header, response: RpcResponse) -> Self {
        Message {
            header: Header {
                magic: PROTOCOL_MAGIC,
                version: PROTOCOL_VERSION,
                serializer: request_header.serializer,
                message_type: MessageType::Response,
                status: MessageStatus::Ok.code(),
                correlation_id: request_header.correlation_id,
                body_length: 0,
            },
            body: MessageBody::Response(response),
        }
    }
}
