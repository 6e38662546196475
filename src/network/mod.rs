//! Network Layer
//!
//! WebSocket boundary for participant connections. Everything
//! game-affecting happens behind this layer; the engine never sees a
//! socket.

pub mod connection;
pub mod protocol;
pub mod server;

pub use connection::ConnectionHandle;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig, SessionRouter};
