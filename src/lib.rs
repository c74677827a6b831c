//! Embeddable TCP connection lifecycle manager and RFC 6455 WebSocket session engine.
//!
//! A host binds a [`Listener`] to a port and supplies a [`ListenerHandler`] — the
//! polymorphism point that decides how a freshly accepted socket is turned into a
//! [`FrameDecoder`]/[`FrameEncoder`] pair. [`WebSocketHandler`] is the batteries-included
//! implementation: it runs the RFC 6455 opening handshake on accept and wires up a
//! fragment-reassembling frame codec. [`raw::RawHandler`] is the degenerate base case —
//! no handshake, each socket read is a complete `Binary` block — used to exercise the
//! generic [`Peer`]/[`Listener`] machinery independent of the WebSocket protocol.
//!
//! Everything downstream of accept runs as a pair of Tokio tasks per peer (reader, writer)
//! moving bytes through a pair of [`buffer::FramedBuffer`]s; see that module and [`peer`] for
//! the producer/consumer handoff this is built on.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod listener;
pub mod opcode;
pub mod peer;
pub mod primitives;
pub mod raw;
pub mod ws;

pub use codec::{FrameDecoder, FrameEncoder};
pub use config::WebSocketConfig;
pub use error::{Error, Result};
pub use listener::{Listener, PeerId};
pub use opcode::Opcode;
pub use peer::{ListenerHandler, Peer};
pub use ws::{WebSocketCallbacks, WebSocketHandler};
