use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    // Protocol errors: fatal to the message they occur on, and a corrupt
    // stream signal for the connection that produced them.
    #[error("invalid magic byte 0x{0:02x}")]
    InvalidMagic(u8),

    #[error("unsupported serializer id {0}")]
    UnsupportedSerializer(u8),

    #[error("unsupported message type {0}")]
    UnsupportedMessageType(u8),

    #[error("frame of {length} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    #[error("response correlation id {actual} does not match request {expected}")]
    CorrelationMismatch { expected: u64, actual: u64 },

    // Discovery errors: surfaced to the call pipeline, eligible for
    // fault-tolerance handling.
    #[error("no provider available for {0}")]
    NoProviderAvailable(String),

    #[error("coordination store unreachable: {0}")]
    StoreUnreachable(String),

    // Call errors: retried per the retry policy, then handed to the
    // tolerant strategy.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("remote call failed: {0}")]
    RemoteCall(String),

    // Registration errors are reported, never fatal to process shutdown.
    #[error("registration error: {0}")]
    Registration(String),

    #[error("no fallback configured: {0}")]
    NoFallback(String),

    #[error("unknown strategy key: {0}")]
    UnknownStrategy(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
