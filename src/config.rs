/// Size ceilings enforced by the codec and the per-worker scratch buffers.
///
/// None of this is mandated by RFC 6455 itself — it is the production-hardening layer the
/// reference implementation's design notes call for: an unbounded peer can otherwise advertise
/// a huge frame or an endless fragmented message and exhaust memory.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Largest single-frame payload accepted on read. Default 16 MiB.
    pub max_frame_size: usize,
    /// Largest reassembled (possibly fragmented) message accepted. Default 64 MiB.
    pub max_message_size: usize,
    /// Ceiling a reader/writer scratch buffer may grow to before a full buffer is treated as
    /// a protocol fault rather than doubled again. Default 16 MiB.
    pub max_scratch_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            max_scratch_size: 16 << 20,
        }
    }
}

/// Initial size of a reader/writer scratch buffer, before any growth.
pub const INITIAL_SCRATCH_SIZE: usize = 1 << 20;
