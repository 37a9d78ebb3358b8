//! Wire vocabulary shared by the game server and its tooling
//!
//! Two layers live here. The session envelope [`Packet`] is what travels in
//! one UDP datagram and is serialized with bincode. Inside `Packet::Reliable`
//! sits the game's own binary format: framed root messages whose GameData
//! payloads carry the object synchronization sub-protocol. That format is
//! hand-encoded by [`codec`] because its layout is fixed by the game client.

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod game_code;
pub mod messages;
pub mod protocol;

pub use codec::{CodecError, MessageReader, MessageWriter};
pub use game_code::GameCode;

/// Session protocol version; mismatched clients are turned away.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side will send or accept.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// One datagram of the session layer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect { client_version: u32, name: String },
    /// Root messages, in the game's own framing.
    Reliable { payload: Vec<u8> },
    Disconnect,

    Connected { client_id: i32 },
    Disconnected { reason: String },
}
