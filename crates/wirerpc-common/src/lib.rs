//! wirerpc Common Types and Transport
//!
//! This crate provides the wire protocol and TCP transport layer shared by
//! every wirerpc component:
//!
//! - **Protocol Layer**: `Message` (fixed 17-byte header + typed body),
//!   `Request`/`Response` bodies, error taxonomy
//! - **Codec**: binary header encoding plus pluggable body serialization
//! - **Framer**: reassembly of complete messages from a raw TCP byte stream
//! - **Transport**: async TCP client used by the call pipeline
//!
//! # Wire Format
//!
//! ```text
//! [magic 1][version 1][serializer 1][type 1][status 1][correlation id 8][body length 4][body ...]
//! ```
//!
//! All multi-byte integers are big-endian. The body is produced by the
//! serializer named in the header; both peers must agree on the serializer
//! out of band (there is no negotiation handshake).

pub mod codec;
pub mod config;
pub mod framer;
pub mod protocol;
pub mod serializer;
pub mod strategy;
pub mod transport;

pub use protocol::{Header, Message, MessageBody, MessageStatus, MessageType, RpcError, Result};
pub use protocol::{RpcRequest, RpcResponse};
