//! The data-frame half of a WebSocket session: a [`FrameDecoder`]/[`FrameEncoder`] pair driving
//! RFC 6455 frame traffic against a [`Peer`]'s buffers, and the [`ListenerHandler`] that performs
//! the opening handshake and wires the pair up for a newly accepted socket.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{self, FrameHeader, FRAME_LIMIT};
use crate::listener::PeerId;
use crate::opcode::Opcode;
use crate::peer::{ListenerHandler, Peer};
use crate::primitives::apply_mask;

use super::handshake::perform_server_handshake;

enum State {
    AwaitingHeader,
    InPayload {
        header: FrameHeader,
        consumed: usize,
    },
}

/// Decodes a client's masked frame stream into complete messages in the peer's inbound buffer.
///
/// Fragmented messages are represented as one growing `Binary`/`Text` block: `begin_block` runs
/// once on the first fragment, each continuation frame's payload is appended with `write`, and
/// `end_block` runs when the FIN frame of the sequence arrives. This sidesteps any notion of
/// per-wire-fragment blocks with opcode bookkeeping on pop — the host only ever sees whole
/// messages.
pub struct WsDecoder {
    config: WebSocketConfig,
    state: State,
    current_opcode: Option<Opcode>,
    fragment_total: usize,
    control_payload: Vec<u8>,
}

impl WsDecoder {
    pub fn new(config: WebSocketConfig) -> Self {
        WsDecoder {
            config,
            state: State::AwaitingHeader,
            current_opcode: None,
            fragment_total: 0,
            control_payload: Vec::new(),
        }
    }

    fn finish_frame(&mut self, header: FrameHeader, peer: &Peer) -> Result<(), Error> {
        if header.opcode.is_control() {
            let payload = std::mem::take(&mut self.control_payload);
            match header.opcode {
                Opcode::Ping => {
                    peer.outbound().push_complete(Opcode::Pong, &payload);
                    peer.notify_writer();
                }
                Opcode::Close => {
                    peer.request_close();
                }
                Opcode::Pong => {}
                _ => unreachable!("only control opcodes reach here"),
            }
            return Ok(());
        }

        if header.fin {
            peer.inbound().end_block();
            self.current_opcode = None;
            self.fragment_total = 0;

            if let Some((opcode, bytes)) = peer.inbound().tail_snapshot() {
                if opcode == Opcode::Text {
                    String::from_utf8(bytes.clone())?;
                }
                if peer.dispatch_message(opcode, bytes) {
                    peer.inbound().discard_tail();
                }
            }
        }

        Ok(())
    }
}

impl FrameDecoder for WsDecoder {
    fn decode(&mut self, scratch: &[u8], peer: &Peer) -> Result<usize, Error> {
        match self.state {
            State::AwaitingHeader => {
                let Some((header, header_len)) = frame::parse_header(scratch)? else {
                    return Ok(0);
                };

                if !header.masked {
                    return Err(Error::UnmaskedClientFrame);
                }
                if header.payload_length > self.config.max_frame_size as u64 {
                    return Err(Error::MaxFrameSizeExceeded(
                        header.payload_length,
                        self.config.max_frame_size,
                    ));
                }

                if !header.opcode.is_control() {
                    if header.opcode == Opcode::Continuation {
                        if self.current_opcode.is_none() {
                            return Err(Error::UnexpectedContinuation);
                        }
                    } else {
                        if self.current_opcode.is_some() {
                            return Err(Error::InterleavedDataFrame);
                        }
                        peer.inbound().begin_block(header.opcode);
                        self.current_opcode = Some(header.opcode);
                        self.fragment_total = 0;
                    }
                } else {
                    self.control_payload.clear();
                }

                if header.payload_length == 0 {
                    self.finish_frame(header, peer)?;
                    self.state = State::AwaitingHeader;
                } else {
                    self.state = State::InPayload { header, consumed: 0 };
                }
                Ok(header_len)
            }
            State::InPayload { header, consumed } => {
                let remaining = (header.payload_length as usize) - consumed;
                let n = scratch.len().min(remaining);
                if n == 0 {
                    return Ok(0);
                }

                let mut bytes = scratch[..n].to_vec();
                let key = header.masking_key.expect("client frames are always masked");
                apply_mask(&mut bytes, key, consumed);

                if header.opcode.is_control() {
                    self.control_payload.extend_from_slice(&bytes);
                } else {
                    self.fragment_total += bytes.len();
                    if self.fragment_total > self.config.max_message_size {
                        return Err(Error::MaxMessageSizeExceeded(
                            self.fragment_total,
                            self.config.max_message_size,
                        ));
                    }
                    peer.inbound().write(&bytes);
                }

                let new_consumed = consumed + n;
                if new_consumed == header.payload_length as usize {
                    self.finish_frame(header, peer)?;
                    self.state = State::AwaitingHeader;
                } else {
                    self.state = State::InPayload {
                        header,
                        consumed: new_consumed,
                    };
                }
                Ok(n)
            }
        }
    }
}

/// Encodes complete outbound blocks as unmasked server-to-client frames, splitting anything
/// larger than [`FRAME_LIMIT`] across `Continuation` frames.
#[derive(Default)]
pub struct WsEncoder {
    in_progress: bool,
}

impl WsEncoder {
    pub fn new() -> Self {
        WsEncoder::default()
    }
}

impl FrameEncoder for WsEncoder {
    fn encode(&mut self, scratch: &mut [u8], peer: &Peer) -> usize {
        let mut written = 0usize;

        loop {
            let Some((opcode, len)) = peer.outbound().peek() else {
                break;
            };

            if scratch.len() - written < 16 {
                break;
            }

            let header_budget = (scratch.len() - written).saturating_sub(14);
            let to_send = header_budget.min(FRAME_LIMIT).min(len);
            if to_send == 0 && len != 0 {
                break;
            }
            let fin = to_send == len;

            let frame_opcode = if self.in_progress {
                Opcode::Continuation
            } else {
                opcode
            };

            let mut header_bytes = Vec::with_capacity(14);
            frame::write_header(&mut header_bytes, fin, frame_opcode, to_send);
            scratch[written..written + header_bytes.len()].copy_from_slice(&header_bytes);
            written += header_bytes.len();

            let payload_written = peer.pop(&mut scratch[written..written + to_send]);
            debug_assert_eq!(payload_written, to_send);
            written += to_send;

            self.in_progress = !fin;
        }

        written
    }
}

/// The default [`ListenerHandler`]: performs the opening handshake on accept, then wires a fresh
/// [`WsDecoder`]/[`WsEncoder`] pair. Application-level callbacks (`on_connect`, `on_disconnect`,
/// `on_message`) are delegated to a user-supplied inner handler.
pub struct WebSocketHandler<H> {
    config: WebSocketConfig,
    inner: H,
}

impl<H> WebSocketHandler<H> {
    pub fn new(inner: H) -> Self {
        WebSocketHandler {
            config: WebSocketConfig::default(),
            inner,
        }
    }

    pub fn with_config(inner: H, config: WebSocketConfig) -> Self {
        WebSocketHandler { config, inner }
    }
}

/// The hooks a host implements to receive WebSocket events, without touching the handshake or
/// framing machinery directly.
pub trait WebSocketCallbacks: Send + Sync + 'static {
    fn on_connect(&self, _peer: &Arc<Peer>) {}
    fn on_disconnect(&self, _peer: &Arc<Peer>) {}
    fn on_message(&self, _peer: &Peer, _opcode: Opcode, _payload: Vec<u8>) -> bool {
        false
    }
}

/// Lets a host share one callbacks instance between a [`WebSocketHandler`] and its own code
/// (e.g. to inspect what arrived after the listener is wired up) by handing over an `Arc`
/// instead of the bare value.
impl<T: WebSocketCallbacks + ?Sized> WebSocketCallbacks for Arc<T> {
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
impl<H: WebSocketCallbacks> ListenerHandler for WebSocketHandler<H> {
    async fn accept(
        &self,
        stream: &mut tokio::net::TcpStream,
        _addr: SocketAddr,
        id: PeerId,
    ) -> Result<(Box<dyn FrameDecoder>, Box<dyn FrameEncoder>), Error> {
        let accept_value = perform_server_handshake(stream).await?;
        log::debug!("peer {}: handshake complete ({})", id, accept_value);
        Ok((
            Box::new(WsDecoder::new(self.config.clone())),
            Box::new(WsEncoder::new()),
        ))
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
