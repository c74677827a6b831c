use crate::error::Error;
use crate::peer::Peer;

/// The reader half of a peer's capability set: turns raw socket bytes into staged [`Block`]s
/// in `peer`'s inbound [`crate::buffer::FramedBuffer`] (via `peer.inbound()`), invoking
/// `peer`'s [`crate::peer::ListenerHandler::on_message`] hook as messages complete.
///
/// [`Block`]: crate::buffer
pub trait FrameDecoder: Send {
    /// Consumes as much of `scratch[..]` as represents a single decode step — a frame header,
    /// or payload bytes belonging to the frame currently in progress.
    ///
    /// Returns the number of bytes consumed, `Ok(0)` to mean "not enough bytes yet — the reader
    /// should grow its scratch buffer if full and read more", or `Err` for an unrecoverable
    /// protocol fault that should terminate the peer.
    fn decode(&mut self, scratch: &[u8], peer: &Peer) -> Result<usize, Error>;
}

/// The writer half of a peer's capability set: drains complete blocks from `peer`'s outbound
/// buffer into wire bytes.
pub trait FrameEncoder: Send {
    /// Fills as much of `scratch` as there is complete outbound data for and room to hold.
    /// Returns the number of bytes written; `0` means there is nothing ready to send right now.
    fn encode(&mut self, scratch: &mut [u8], peer: &Peer) -> usize;
}
