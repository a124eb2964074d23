pub mod error;
pub mod message;
pub mod request;
pub mod response;

pub use error::{Result, RpcError};
pub use message::{
    next_correlation_id, Header, Message, MessageBody, MessageStatus, MessageType, HEADER_LENGTH,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use request::{json_type_name, RpcRequest, DEFAULT_SERVICE_VERSION};
pub use response::RpcResponse;
