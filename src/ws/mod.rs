//! RFC 6455 WebSocket support: the opening handshake and the data-frame codec built on top
//! of the generic [`crate::peer::Peer`]/[`crate::listener::Listener`] machinery.

mod handshake;
mod session;

pub use session::{WebSocketCallbacks, WebSocketHandler, WsDecoder, WsEncoder};
