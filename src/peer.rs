use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;

use crate::buffer::FramedBuffer;
use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::{WebSocketConfig, INITIAL_SCRATCH_SIZE};
use crate::error::Error;
use crate::listener::{ListenerShared, PeerId};
use crate::opcode::Opcode;

/// The peer-factory / lifecycle hooks a host implements to customize a [`crate::Listener`].
///
/// This is the polymorphism point the reference design calls a capability set rather than a
/// class hierarchy: the built-in [`crate::ws::WebSocketHandler`] and [`crate::raw::RawHandler`]
/// are both plain implementors of this trait, not subclasses of some base session type.
#[async_trait::async_trait]
pub trait ListenerHandler: Send + Sync + 'static {
    /// Runs once, synchronously with respect to the rest of this peer's life, immediately after
    /// accept. For a WebSocket peer this performs the RFC 6455 opening handshake on `stream`
    /// before returning the decoder/encoder pair the reader/writer workers will drive. Returning
    /// `Err` rejects the connection: the socket is dropped and no workers are started.
    async fn accept(
        &self,
        stream: &mut tokio::net::TcpStream,
        addr: SocketAddr,
        id: PeerId,
    ) -> Result<(Box<dyn FrameDecoder>, Box<dyn FrameEncoder>), Error>;

    /// Fired after a peer has been accepted and inserted into the listener's live-peer set.
    fn on_connect(&self, _peer: &Arc<Peer>) {}

    /// Fired by the reaper immediately before a peer is destroyed.
    fn on_disconnect(&self, _peer: &Arc<Peer>) {}

    /// Fired by the reader when an inbound message completes. Returning `true` means the host
    /// consumed `payload` here and the buffered block should be discarded; `false` leaves it for
    /// a later `peek`/`pop`.
    fn on_message(&self, _peer: &Peer, _opcode: Opcode, _payload: Vec<u8>) -> bool {
        false
    }
}

/// A single accepted connection: an inbound/outbound [`FramedBuffer`] pair, a close-requested
/// flag, and the reader/writer workers' shared handle back to the listener.
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    inbound: FramedBuffer,
    outbound: FramedBuffer,
    outbound_notify: Notify,
    shutdown: Notify,
    close_requested: AtomicBool,
    config: WebSocketConfig,
    handler: Arc<dyn ListenerHandler>,
    listener: Weak<ListenerShared>,
}

impl Peer {
    pub(crate) fn new(
        id: PeerId,
        addr: SocketAddr,
        config: WebSocketConfig,
        handler: Arc<dyn ListenerHandler>,
        listener: Weak<ListenerShared>,
    ) -> Arc<Self> {
        Arc::new(Peer {
            id,
            addr,
            inbound: FramedBuffer::new(),
            outbound: FramedBuffer::new(),
            outbound_notify: Notify::new(),
            shutdown: Notify::new(),
            close_requested: AtomicBool::new(false),
            config,
            handler,
            listener,
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    pub(crate) fn inbound(&self) -> &FramedBuffer {
        &self.inbound
    }

    pub(crate) fn outbound(&self) -> &FramedBuffer {
        &self.outbound
    }

    pub(crate) fn notify_writer(&self) {
        self.outbound_notify.notify_one();
    }

    pub(crate) fn dispatch_message(&self, opcode: Opcode, payload: Vec<u8>) -> bool {
        self.handler.on_message(self, opcode, payload)
    }

    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    /// Flips the close-requested flag and wakes any worker waiting on it. Idempotent: only the
    /// first caller notifies the listener's reaper.
    pub(crate) fn request_close(&self) {
        if self
            .close_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.shutdown.notify_waiters();
            self.outbound_notify.notify_waiters();
            if let Some(listener) = self.listener.upgrade() {
                listener.notify_disconnect();
            }
        }
    }

    /// Host-initiated disconnect. Idempotent — a second call on an already-closing peer is a
    /// no-op.
    pub fn disconnect(&self) {
        self.request_close();
    }

    /// Appends a complete `Binary` block to the outbound buffer and wakes the writer.
    pub fn push(&self, bytes: &[u8]) -> Result<(), Error> {
        if self.is_close_requested() {
            return Err(Error::PeerDisconnected);
        }
        self.outbound.push_complete(Opcode::Binary, bytes);
        self.notify_writer();
        Ok(())
    }

    /// Appends a complete `Text` block to the outbound buffer and wakes the writer.
    pub fn push_text(&self, text: &str) -> Result<(), Error> {
        if self.is_close_requested() {
            return Err(Error::PeerDisconnected);
        }
        self.outbound.push_complete(Opcode::Text, text.as_bytes());
        self.notify_writer();
        Ok(())
    }

    /// Fires the handler's `on_disconnect` hook. Called by the listener's reaper once, right
    /// before a peer is dropped from the live set.
    pub(crate) fn fire_on_disconnect(self: &Arc<Self>) {
        self.handler.on_disconnect(self);
    }

    /// Peeks the next completed inbound block, if any.
    pub fn peek(&self) -> Option<(Opcode, usize)> {
        self.inbound.peek()
    }

    /// Drains up to `dst.len()` bytes of the head inbound block.
    pub fn pop(&self, dst: &mut [u8]) -> usize {
        self.inbound.pop(dst)
    }
}

/// Drives the reader side of a peer: reads bytes off the socket, decodes them into `peer`'s
/// inbound buffer via `decoder`, until the socket errors, EOF, a protocol fault, or
/// close-requested.
pub(crate) async fn run_reader(
    peer: Arc<Peer>,
    mut read_half: OwnedReadHalf,
    mut decoder: Box<dyn FrameDecoder>,
) {
    let max_scratch = peer.config().max_scratch_size;
    let mut scratch = vec![0u8; INITIAL_SCRATCH_SIZE];
    let mut filled = 0usize;

    'outer: loop {
        if peer.is_close_requested() {
            break;
        }

        let read_result = tokio::select! {
            _ = peer.shutdown.notified() => break,
            result = read_half.read(&mut scratch[filled..]) => result,
        };

        match read_result {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                loop {
                    match decoder.decode(&scratch[..filled], &peer) {
                        Ok(0) => break,
                        Ok(consumed) => {
                            scratch.copy_within(consumed..filled, 0);
                            filled -= consumed;
                        }
                        Err(err) => {
                            log::warn!("peer {}: protocol fault: {}", peer.id(), err);
                            break 'outer;
                        }
                    }
                }
                if filled == scratch.len() {
                    if scratch.len() >= max_scratch {
                        log::warn!("peer {}: scratch buffer exceeded {} bytes", peer.id(), max_scratch);
                        break;
                    }
                    let new_len = (scratch.len() * 2).min(max_scratch);
                    scratch.resize(new_len, 0);
                }
            }
            Err(err) => {
                log::debug!("peer {}: read error: {}", peer.id(), err);
                break;
            }
        }
    }

    peer.request_close();
}

/// Drives the writer side of a peer: waits for the outbound buffer's notification, encodes as
/// many complete blocks as fit via `encoder`, and writes the result to the socket.
pub(crate) async fn run_writer(
    peer: Arc<Peer>,
    mut write_half: OwnedWriteHalf,
    mut encoder: Box<dyn FrameEncoder>,
) {
    let max_scratch = peer.config().max_scratch_size;
    let mut scratch = vec![0u8; INITIAL_SCRATCH_SIZE];

    loop {
        if peer.is_close_requested() && peer.outbound().peek().is_none() {
            break;
        }

        tokio::select! {
            _ = peer.shutdown.notified() => {
                if peer.outbound().peek().is_none() {
                    break;
                }
            }
            _ = peer.outbound_notify.notified() => {}
        }

        loop {
            let n = encoder.encode(&mut scratch, &peer);
            if n == 0 {
                if scratch.len() < max_scratch && peer.outbound().peek().is_some() {
                    // A queued block didn't fit even with an empty scratch buffer (shouldn't
                    // normally happen given FRAME_LIMIT, but grow defensively rather than spin).
                    let new_len = (scratch.len() * 2).min(max_scratch);
                    if new_len > scratch.len() {
                        scratch.resize(new_len, 0);
                        continue;
                    }
                }
                break;
            }
            if let Err(err) = write_half.write_all(&scratch[..n]).await {
                log::debug!("peer {}: write error: {}", peer.id(), err);
                peer.request_close();
                return;
            }
        }

        if peer.is_close_requested() && peer.outbound().peek().is_none() {
            break;
        }
    }

    let _ = write_half.shutdown().await;
}
