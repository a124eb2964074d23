//! Stream framer: reassembles complete protocol messages from a raw TCP
//! byte stream.
//!
//! TCP delivers arbitrary-sized chunks with no message boundaries: a
//! message may arrive split across many reads (half packet) or several
//! messages may share one read (sticky packet). The framer is a small
//! two-state machine owned by exactly one connection:
//!
//! - **AwaitingHeader**: accumulate the fixed 17-byte header, read the body
//!   length at offset 13, switch to the body state.
//! - **AwaitingBody**: accumulate exactly that many body bytes, emit
//!   header+body as one complete message buffer, reset.
//!
//! It never blocks; [`StreamFramer::push`] consumes whatever bytes are
//! available and returns every message completed by them.
//!
//! # Example
//!
//! ```
//! use wirerpc_common::framer::StreamFramer;
//! use wirerpc_common::codec;
//! use wirerpc_common::serializer::SerializerRegistry;
//! use wirerpc_common::protocol::{Message, RpcRequest};
//!
//! let serializers = SerializerRegistry::default();
//! let message = Message::request(1, RpcRequest::new("Greet", "hello", vec![]));
//! let encoded = codec::encode(&message, &serializers).unwrap();
//!
//! let mut framer = StreamFramer::new();
//! // Feed one byte at a time; exactly one frame comes out, byte-identical.
//! let mut frames = Vec::new();
//! for byte in &encoded {
//!     frames.extend(framer.push(std::slice::from_ref(byte)).unwrap());
//! }
//! assert_eq!(frames, vec![encoded]);
//! ```

use crate::protocol::error::{Result, RpcError};
use crate::protocol::message::HEADER_LENGTH;

/// Maximum accepted body length (8 MiB). Guards against allocating huge
/// buffers from a corrupt or hostile length field.
pub const MAX_BODY_LENGTH: usize = 8 * 1024 * 1024;

enum FramerState {
    AwaitingHeader,
    /// Total frame length (header + body) once the header is complete.
    AwaitingBody(usize),
}

/// Per-connection message reassembly state machine. Never shared across
/// connections.
pub struct StreamFramer {
    state: FramerState,
    buf: Vec<u8>,
}

impl StreamFramer {
    pub fn new() -> Self {
        StreamFramer {
            state: FramerState::AwaitingHeader,
            buf: Vec::new(),
        }
    }

    /// Consumes a chunk of stream bytes and returns every complete message
    /// (header + body, byte-identical to the sender's encoding) finished by
    /// this chunk, in stream order.
    ///
    /// # Errors
    ///
    /// `FrameTooLarge` if a header announces a body beyond
    /// [`MAX_BODY_LENGTH`]; the connection should be closed, the stream can
    /// no longer be trusted.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.state {
                FramerState::AwaitingHeader => {
                    if self.buf.len() < HEADER_LENGTH {
                        break;
                    }
                    let body_length = u32::from_be_bytes([
                        self.buf[13],
                        self.buf[14],
                        self.buf[15],
                        self.buf[16],
                    ]) as usize;
                    if body_length > MAX_BODY_LENGTH {
                        return Err(RpcError::FrameTooLarge {
                            length: body_length,
                            max: MAX_BODY_LENGTH,
                        });
                    }
                    self.state = FramerState::AwaitingBody(HEADER_LENGTH + body_length);
                }
                FramerState::AwaitingBody(total) => {
                    if self.buf.len() < total {
                        break;
                    }
                    let rest = self.buf.split_off(total);
                    frames.push(std::mem::replace(&mut self.buf, rest));
                    self.state = FramerState::AwaitingHeader;
                }
            }
        }

        Ok(frames)
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::protocol::{Message, RpcRequest};
    use crate::serializer::SerializerRegistry;
    use serde_json::json;

    fn encoded_messages(n: usize) -> Vec<Vec<u8>> {
        let serializers = SerializerRegistry::default();
        (0..n)
            .map(|i| {
                let message = Message::request(
                    1,
                    RpcRequest::new("Greet", format!("method{i}"), vec![json!(i)]),
                );
                codec::encode(&message, &serializers).unwrap()
            })
            .collect()
    }

    #[test]
    fn one_message_in_one_chunk() {
        let messages = encoded_messages(1);
        let mut framer = StreamFramer::new();
        let frames = framer.push(&messages[0]).unwrap();
        assert_eq!(frames, messages);
    }

    #[test]
    fn sticky_packet_yields_every_message_in_order() {
        let messages = encoded_messages(4);
        let stream: Vec<u8> = messages.iter().flatten().copied().collect();

        let mut framer = StreamFramer::new();
        let frames = framer.push(&stream).unwrap();
        assert_eq!(frames, messages);
    }

    #[test]
    fn one_byte_at_a_time_yields_identical_frames() {
        let messages = encoded_messages(3);
        let stream: Vec<u8> = messages.iter().flatten().copied().collect();

        let mut framer = StreamFramer::new();
        let mut frames = Vec::new();
        for byte in &stream {
            frames.extend(framer.push(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames, messages);
    }

    #[test]
    fn arbitrary_chunk_sizes_yield_identical_frames() {
        let messages = encoded_messages(5);
        let stream: Vec<u8> = messages.iter().flatten().copied().collect();

        // Chunk sizes chosen to straddle header/body boundaries.
        for chunk_size in [1, 2, 3, 7, 16, 17, 18, 64, 1024] {
            let mut framer = StreamFramer::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                frames.extend(framer.push(chunk).unwrap());
            }
            assert_eq!(frames, messages, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn split_mid_header_and_mid_body() {
        let messages = encoded_messages(1);
        let encoded = &messages[0];

        let mut framer = StreamFramer::new();
        assert!(framer.push(&encoded[..5]).unwrap().is_empty());
        assert!(framer.push(&encoded[5..20]).unwrap().is_empty());
        let frames = framer.push(&encoded[20..]).unwrap();
        assert_eq!(frames, messages);
    }

    #[test]
    fn oversized_body_length_is_rejected() {
        let mut header = vec![0u8; HEADER_LENGTH];
        header[13..17].copy_from_slice(&(u32::MAX).to_be_bytes());

        let mut framer = StreamFramer::new();
        assert!(matches!(
            framer.push(&header),
            Err(RpcError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn empty_push_emits_nothing() {
        let mut framer = StreamFramer::new();
        assert!(framer.push(&[]).unwrap().is_empty());
    }
}
