//! Wire codec: encodes a [`Message`] to its binary form and back.
//!
//! The codec owns the `body_length` invariant: on encode it writes the
//! exact length of the serialized body into the header; on decode it reads
//! exactly that many body bytes. Decode failures are distinct error kinds
//! (`InvalidMagic`, `UnsupportedSerializer`, `UnsupportedMessageType`) and
//! are never silently coerced into one another.

use crate::protocol::error::{Result, RpcError};
use crate::protocol::message::{
    Header, Message, MessageBody, MessageType, HEADER_LENGTH, PROTOCOL_MAGIC,
};
use crate::serializer::SerializerRegistry;

/// Encodes a message: header fields in fixed order, then the serialized
/// body produced by the serializer named in the header.
pub fn encode(message: &Message, serializers: &SerializerRegistry) -> Result<Vec<u8>> {
    let serializer = serializers.by_id(message.header.serializer)?;

    let body = match &message.body {
        MessageBody::Request(request) => serializer.encode_request(request)?,
        MessageBody::Response(response) => serializer.encode_response(response)?,
    };

    let mut buf = Vec::with_capacity(HEADER_LENGTH + body.len());
    buf.push(message.header.magic);
    buf.push(message.header.version);
    buf.push(message.header.serializer);
    buf.push(message.header.message_type.code());
    buf.push(message.header.status);
    buf.extend_from_slice(&message.header.correlation_id.to_be_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);

    Ok(buf)
}

/// Decodes one complete message buffer (header plus body) as emitted by the
/// stream framer.
///
/// # Errors
///
/// - `InvalidMagic` if the first byte differs from the protocol magic
/// - `UnsupportedSerializer` if the serializer id has no implementation
/// - `UnsupportedMessageType` for heartbeat/other (valid header values with
///   no body decoder) and for type values outside the protocol range
/// - `Connection` if the buffer is shorter than the header announces
pub fn decode(buf: &[u8], serializers: &SerializerRegistry) -> Result<Message> {
    if buf.len() < HEADER_LENGTH {
        return Err(RpcError::Connection(format!(
            "truncated message: {} bytes, header needs {}",
            buf.len(),
            HEADER_LENGTH
        )));
    }

    let magic = buf[0];
    if magic != PROTOCOL_MAGIC {
        return Err(RpcError::InvalidMagic(magic));
    }

    let version = buf[1];
    let serializer_id = buf[2];
    let type_code = buf[3];
    let status = buf[4];
    let correlation_id = u64::from_be_bytes([
        buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11], buf[12],
    ]);
    let body_length = u32::from_be_bytes([buf[13], buf[14], buf[15], buf[16]]);

    let body_end = HEADER_LENGTH + body_length as usize;
    if buf.len() < body_end {
        return Err(RpcError::Connection(format!(
            "truncated body: have {} bytes, header announces {}",
            buf.len() - HEADER_LENGTH,
            body_length
        )));
    }
    let body_bytes = &buf[HEADER_LENGTH..body_end];

    let serializer = serializers.by_id(serializer_id)?;

    let message_type = MessageType::from_code(type_code)
        .ok_or(RpcError::UnsupportedMessageType(type_code))?;

    let body = match message_type {
        MessageType::Request => MessageBody::Request(serializer.decode_request(body_bytes)?),
        MessageType::Response => MessageBody::Response(serializer.decode_response(body_bytes)?),
        // Valid header values, but the protocol defines no body for them.
        MessageType::Heartbeat | MessageType::Other => {
            return Err(RpcError::UnsupportedMessageType(type_code))
        }
    };

    Ok(Message {
        header: Header {
            magic,
            version,
            serializer: serializer_id,
            message_type,
            status,
            correlation_id,
            body_length,
        },
        body,
    })
}
