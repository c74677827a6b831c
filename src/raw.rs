//! The degenerate base case of the `{handshake, decode, encode}` capability set: no opening
//! handshake, and every socket read is staged as a single complete `Binary` block rather than
//! being parsed into frames. [`WebSocketHandler`] is the other variant over the same
//! `ListenerHandler`/`FrameDecoder`/`FrameEncoder` seam — this one exists to let the generic
//! `Peer`/`Listener` plumbing (accept, reap, push/peek/pop, disconnect) be exercised without
//! involving RFC 6455 at all.
//!
//! [`WebSocketHandler`]: crate::ws::WebSocketHandler

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec::{FrameDecoder, FrameEncoder};
use crate::error::Error;
use crate::listener::PeerId;
use crate::opcode::Opcode;
use crate::peer::{ListenerHandler, Peer};

/// Stages every byte handed to `decode` as one complete `Binary` block — no header, no framing.
#[derive(Default)]
pub struct RawDecoder;

impl RawDecoder {
    pub fn new() -> Self {
        RawDecoder
    }
}

impl FrameDecoder for RawDecoder {
    fn decode(&mut self, scratch: &[u8], peer: &Peer) -> Result<usize, Error> {
        if scratch.is_empty() {
            return Ok(0);
        }
        peer.inbound().begin_block(Opcode::Binary);
        peer.inbound().write(scratch);
        peer.inbound().end_block();

        if let Some((opcode, bytes)) = peer.inbound().tail_snapshot() {
            if peer.dispatch_message(opcode, bytes) {
                peer.inbound().discard_tail();
            }
        }

        Ok(scratch.len())
    }
}

/// Copies as many complete outbound blocks' raw bytes as fit into `scratch` — no frame headers.
#[derive(Default)]
pub struct RawEncoder;

impl RawEncoder {
    pub fn new() -> Self {
        RawEncoder
    }
}

impl FrameEncoder for RawEncoder {
    fn encode(&mut self, scratch: &mut [u8], peer: &Peer) -> usize {
        let mut written = 0usize;
        while written < scratch.len() {
            if peer.outbound().peek().is_none() {
                break;
            }
            let n = peer.pop(&mut scratch[written..]);
            if n == 0 {
                break;
            }
            written += n;
        }
        written
    }
}

/// A [`ListenerHandler`] that skips the opening handshake entirely and wires a [`RawDecoder`]/
/// [`RawEncoder`] pair for every accepted socket. Application-level hooks are delegated to a
/// user-supplied inner handler, mirroring [`crate::ws::WebSocketHandler`]'s shape.
pub struct RawHandler<H> {
    inner: H,
}

impl<H> RawHandler<H> {
    pub fn new(inner: H) -> Self {
        RawHandler { inner }
    }
}

/// The hooks a host implements to receive raw-session events.
pub trait RawCallbacks: Send + Sync + 'static {
    fn on_connect(&self, _peer: &Arc<Peer>) {}
    fn on_disconnect(&self, _peer: &Arc<Peer>) {}
    fn on_message(&self, _peer: &Peer, _opcode: Opcode, _payload: Vec<u8>) -> bool {
        false
    }
}

/// Mirrors [`crate::ws::WebSocketCallbacks`]'s `Arc` blanket impl, for the same reason: a host
/// that wants to keep its own handle to a callbacks instance after handing it to a
/// [`RawHandler`] needs `Arc<T>` to itself satisfy the trait.
impl<T: RawCallbacks + ?Sized> RawCallbacks for Arc<T> {
    fn on_connect(&self, peer: &Arc<Peer>) {
        (**self).on_connect(peer)
    }

    fn on_disconnect(&self, peer: &Arc<Peer>) {
        (**self).on_disconnect(peer)
    }

    fn on_message(&self, peer: &Peer, opcode: Opcode, payload: Vec<u8>) -> bool {
        (**self).on_message(peer, opcode, payload)
    }
}

#[async_trait::async_trait]
impl<H: RawCallbacks> ListenerHandler for RawHandler<H> {
    async fn accept(
        &self,
        _stream: &mut tokio::net::TcpStream,
        _addr: SocketAddr,
        _id: PeerId,
    ) -> Result<(Box<dyn FrameDecoder>, Box<dyn FrameEncoder>), Error> {
        Ok((Box::new(RawDecoder::new()), Box::new(RawEncoder::new())))
    }

    fn on_connect(&self, peer: &Arc<Peer>) {
        self.inner.on_connect(peer);
    }

    fn on_disconnect(&self, peer: &Arc<Peer>) {
        self.inner.on_disconnect(peer);
    }

    fn on_message(&self, peer: &Peer, opcode: Opcode, payload: Vec<u8>) -> bool {
        self.inner.on_message(peer, opcode, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebSocketConfig;
    use std::sync::Weak;

    fn new_test_peer() -> Arc<Peer> {
        struct NoopHandler;
        #[async_trait::async_trait]
        impl ListenerHandler for NoopHandler {
            async fn accept(
                &self,
                _stream: &mut tokio::net::TcpStream,
                _addr: SocketAddr,
                _id: PeerId,
            ) -> Result<(Box<dyn FrameDecoder>, Box<dyn FrameEncoder>), Error> {
                unreachable!("not exercised in these tests")
            }
        }
        Peer::new(
            1,
            "127.0.0.1:0".parse().unwrap(),
            WebSocketConfig::default(),
            Arc::new(NoopHandler),
            Weak::new(),
        )
    }

    #[test]
    fn decode_stages_the_whole_chunk_as_one_binary_block() {
        let peer = new_test_peer();
        let mut decoder = RawDecoder::new();
        let consumed = decoder.decode(b"hello world", &peer).unwrap();
        assert_eq!(consumed, 11);
        assert_eq!(peer.peek(), Some((Opcode::Binary, 11)));
        let mut dst = [0u8; 11];
        peer.pop(&mut dst);
        assert_eq!(&dst, b"hello world");
    }

    #[test]
    fn encode_drains_pushed_bytes_verbatim() {
        let peer = new_test_peer();
        peer.push(b"raw bytes").unwrap();

        let mut encoder = RawEncoder::new();
        let mut scratch = vec![0u8; 64];
        let n = encoder.encode(&mut scratch, &peer);
        assert_eq!(n, 9);
        assert_eq!(&scratch[..9], b"raw bytes");
    }
}
