use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// These are *kinds*, not an exhaustive type hierarchy: callers are expected to match on
/// variants they care about and treat the rest as "this peer is finished".
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    InvalidUtf8 {
        #[from]
        source: FromUtf8Error,
    },

    #[error("{source}")]
    HttpParse {
        #[from]
        source: httparse::Error,
    },

    #[error("handshake timed out before the opening request completed")]
    HandshakeTimeout,

    #[error("handshake request exceeded the header size limit")]
    HandshakeTooLarge,

    #[error("request is not a GET")]
    NotAGetRequest,

    #[error("Upgrade: websocket header missing from the handshake request")]
    NoUpgradeHeader,

    #[error("Connection: Upgrade header missing from the handshake request")]
    NoConnectionHeader,

    #[error("Sec-WebSocket-Key header missing from the handshake request")]
    NoSecWebSocketKey,

    #[error("reserved RSV bits set without a negotiated extension")]
    ReservedBitsSet,

    #[error("reserved or unknown opcode {0:#x}")]
    InvalidOpcode(u8),

    #[error("control frames must not be fragmented")]
    FragmentedControlFrame,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadTooLarge,

    #[error("64-bit frame length has its top bit set")]
    FrameLengthTooLarge,

    #[error("frame payload of {0} bytes exceeds the configured maximum of {1}")]
    MaxFrameSizeExceeded(u64, usize),

    #[error("reassembled message of {0} bytes exceeds the configured maximum of {1}")]
    MaxMessageSizeExceeded(usize, usize),

    #[error("client frame was not masked")]
    UnmaskedClientFrame,

    #[error("continuation frame received with no fragmented message in progress")]
    UnexpectedContinuation,

    #[error("non-continuation data frame received while a fragmented message is in progress")]
    InterleavedDataFrame,

    #[error("scratch buffer exceeded the configured maximum of {0} bytes")]
    ScratchOverflow(usize),

    #[error("peer is disconnected")]
    PeerDisconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
