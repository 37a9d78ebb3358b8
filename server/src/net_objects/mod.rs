//! Networked objects
//!
//! Every object the host spawns is one component of a prefab (see
//! [`crate::spawn_catalog`]). The set of component kinds is fixed by the
//! game client, so they are modelled as a closed enum of state structs and
//! dispatched with a `match` rather than through trait objects.
//!
//! Each component supports three operations:
//! - [`NetObject::decode_delta`] applies a full snapshot (at spawn) or an
//!   incremental update (DataFlag) to the component's state
//! - [`NetObject::encode_delta`] writes the component's state back out and
//!   reports whether anything was written
//! - [`NetObject::handle_remote_call`] executes one RPC
//!
//! Unfinished or unknown operations return errors that the dispatcher logs
//! and swallows; they never abort the surrounding payload.

mod game_data;
mod player;

pub use game_data::{GameDataState, PlayerInfo, TaskInfo, VoteBanState};
pub use player::{NetworkTransformState, PlayerControlState, Vector2};

use log::trace;
use shared::codec::{CodecError, MessageReader, MessageWriter};
use shared::protocol::{RpcCall, SpawnFlags, GLOBAL_OWNER_ID, INVALID_HANDLE};
use thiserror::Error;

/// Component kinds a prefab can be made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetObjectKind {
    ShipStatus,
    MeetingHud,
    LobbyBehaviour,
    GameData,
    VoteBanSystem,
    PlayerControl,
    PlayerPhysics,
    CustomNetworkTransform,
}

/// Errors raised by a single component operation
#[derive(Debug, Error)]
pub enum NetObjectError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{kind:?} does not implement {operation}")]
    NotImplemented {
        kind: NetObjectKind,
        operation: &'static str,
    },

    #[error("{kind:?} has no remote call {call_id}")]
    UnknownRpc { kind: NetObjectKind, call_id: u8 },
}

/// State of a component whose contents are not interpreted by the server
///
/// The last snapshot and the last delta are retained verbatim so they can be
/// replayed to late observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpaqueState {
    pub snapshot: Vec<u8>,
    pub last_delta: Vec<u8>,
}

impl OpaqueState {
    fn decode(&mut self, reader: &mut MessageReader<'_>, initial_state: bool) -> Result<(), CodecError> {
        let bytes = reader.read_bytes(reader.remaining())?.to_vec();
        if initial_state {
            self.snapshot = bytes;
        } else {
            self.last_delta = bytes;
        }
        Ok(())
    }

    fn encode(&self, writer: &mut MessageWriter, initial_state: bool) -> bool {
        let bytes = if initial_state {
            &self.snapshot
        } else {
            &self.last_delta
        };
        writer.write_bytes(bytes);
        !bytes.is_empty()
    }
}

/// Per-kind component state
#[derive(Debug, Clone)]
pub enum NetObjectState {
    ShipStatus(OpaqueState),
    MeetingHud(OpaqueState),
    LobbyBehaviour,
    GameData(GameDataState),
    VoteBanSystem(VoteBanState),
    PlayerControl(PlayerControlState),
    PlayerPhysics,
    CustomNetworkTransform(NetworkTransformState),
}

impl NetObjectState {
    pub fn new(kind: NetObjectKind) -> Self {
        match kind {
            NetObjectKind::ShipStatus => Self::ShipStatus(OpaqueState::default()),
            NetObjectKind::MeetingHud => Self::MeetingHud(OpaqueState::default()),
            NetObjectKind::LobbyBehaviour => Self::LobbyBehaviour,
            NetObjectKind::GameData => Self::GameData(GameDataState::default()),
            NetObjectKind::VoteBanSystem => Self::VoteBanSystem(VoteBanState::default()),
            NetObjectKind::PlayerControl => Self::PlayerControl(PlayerControlState::default()),
            NetObjectKind::PlayerPhysics => Self::PlayerPhysics,
            NetObjectKind::CustomNetworkTransform => {
                Self::CustomNetworkTransform(NetworkTransformState::default())
            }
        }
    }

    pub fn kind(&self) -> NetObjectKind {
        match self {
            Self::ShipStatus(_) => NetObjectKind::ShipStatus,
            Self::MeetingHud(_) => NetObjectKind::MeetingHud,
            Self::LobbyBehaviour => NetObjectKind::LobbyBehaviour,
            Self::GameData(_) => NetObjectKind::GameData,
            Self::VoteBanSystem(_) => NetObjectKind::VoteBanSystem,
            Self::PlayerControl(_) => NetObjectKind::PlayerControl,
            Self::PlayerPhysics => NetObjectKind::PlayerPhysics,
            Self::CustomNetworkTransform(_) => NetObjectKind::CustomNetworkTransform,
        }
    }
}

/// One networked component
#[derive(Debug, Clone)]
pub struct NetObject {
    /// Wire-assigned handle; [`INVALID_HANDLE`] while unregistered.
    pub handle: u32,
    pub owner_id: i32,
    pub spawn_flags: SpawnFlags,
    pub state: NetObjectState,
}

impl NetObject {
    pub fn new(kind: NetObjectKind) -> Self {
        Self {
            handle: INVALID_HANDLE,
            owner_id: GLOBAL_OWNER_ID,
            spawn_flags: SpawnFlags::NONE,
            state: NetObjectState::new(kind),
        }
    }

    pub fn kind(&self) -> NetObjectKind {
        self.state.kind()
    }

    pub fn is_registered(&self) -> bool {
        self.handle != INVALID_HANDLE
    }

    /// Applies wire bytes to this component's state.
    ///
    /// An empty body is always a no-op.
    pub fn decode_delta(
        &mut self,
        sender_id: i32,
        reader: &mut MessageReader<'_>,
        initial_state: bool,
    ) -> Result<(), NetObjectError> {
        if !reader.has_remaining() {
            return Ok(());
        }

        trace!(
            "{:?} {} <- {} bytes from client {} (initial: {})",
            self.kind(),
            self.handle,
            reader.remaining(),
            sender_id,
            initial_state
        );

        let kind = self.kind();
        match &mut self.state {
            NetObjectState::ShipStatus(state) | NetObjectState::MeetingHud(state) => {
                state.decode(reader, initial_state)?
            }
            NetObjectState::LobbyBehaviour | NetObjectState::PlayerPhysics => {}
            NetObjectState::GameData(state) => {
                if !initial_state {
                    return Err(NetObjectError::NotImplemented {
                        kind,
                        operation: "delta decode",
                    });
                }
                state.decode_initial(reader)?
            }
            NetObjectState::VoteBanSystem(state) => state.decode(reader)?,
            NetObjectState::PlayerControl(state) => state.decode(reader, initial_state)?,
            NetObjectState::CustomNetworkTransform(state) => {
                state.decode(reader, initial_state)?
            }
        }

        Ok(())
    }

    /// Writes this component's state; returns whether anything was written.
    pub fn encode_delta(
        &self,
        writer: &mut MessageWriter,
        initial_state: bool,
    ) -> Result<bool, NetObjectError> {
        let kind = self.kind();
        let changed = match &self.state {
            NetObjectState::ShipStatus(state) | NetObjectState::MeetingHud(state) => {
                state.encode(writer, initial_state)
            }
            NetObjectState::LobbyBehaviour | NetObjectState::PlayerPhysics => false,
            // Outbound player records have no agreed layout yet.
            NetObjectState::GameData(_) => {
                return Err(NetObjectError::NotImplemented {
                    kind,
                    operation: "encode",
                })
            }
            NetObjectState::VoteBanSystem(state) => state.encode(writer),
            NetObjectState::PlayerControl(state) => state.encode(writer, initial_state),
            NetObjectState::CustomNetworkTransform(state) => state.encode(writer),
        };

        Ok(changed)
    }

    /// Executes one remote procedure call addressed to this component.
    pub fn handle_remote_call(
        &mut self,
        sender_id: i32,
        call_id: u8,
        reader: &mut MessageReader<'_>,
    ) -> Result<(), NetObjectError> {
        let kind = self.kind();
        let Some(call) = RpcCall::from_u8(call_id) else {
            return Err(NetObjectError::UnknownRpc { kind, call_id });
        };

        trace!(
            "{:?} {} <- rpc {:?} from client {}",
            kind,
            self.handle,
            call,
            sender_id
        );

        let handled = match &mut self.state {
            NetObjectState::PlayerControl(state) => state.handle_rpc(call, reader)?,
            NetObjectState::CustomNetworkTransform(state) => state.handle_rpc(call, reader)?,
            _ => false,
        };

        if handled {
            Ok(())
        } else {
            Err(NetObjectError::NotImplemented {
                kind,
                operation: "remote call",
            })
        }
    }
}
