//! Root message and GameData sub-message builders
//!
//! Writers append one framed message to a [`MessageWriter`]. The
//! [`ServerMessage`] decoder is the client-side view of what the server
//! emits and is used by tooling and tests.

use crate::codec::{CodecError, MessageReader, MessageWriter};
use crate::game_code::GameCode;
use crate::protocol::{
    AlterGameTag, DisconnectReason, GameDataTag, GameOverReason, MessageFlag, SpawnFlags,
};

pub fn write_host_game(writer: &mut MessageWriter, code: GameCode) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::HostGame.as_u8());
    writer.write_i32(code.value());
    writer.end_message()
}

/// HostGame as sent by a client; the options blob is opaque to the server.
pub fn write_host_game_request(
    writer: &mut MessageWriter,
    options: &[u8],
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::HostGame.as_u8());
    writer.write_bytes(options);
    writer.end_message()
}

pub fn write_join_game(
    writer: &mut MessageWriter,
    code: GameCode,
    client_id: i32,
    host_id: i32,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::JoinGame.as_u8());
    writer.write_i32(code.value());
    writer.write_i32(client_id);
    writer.write_i32(host_id);
    writer.end_message()
}

pub fn write_join_game_request(
    writer: &mut MessageWriter,
    code: GameCode,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::JoinGame.as_u8());
    writer.write_i32(code.value());
    writer.end_message()
}

pub fn write_join_game_error(
    writer: &mut MessageWriter,
    reason: DisconnectReason,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::JoinGame.as_u8());
    writer.write_i32(i32::from(reason.as_u8()));
    writer.end_message()
}

pub fn write_joined_game(
    writer: &mut MessageWriter,
    code: GameCode,
    client_id: i32,
    host_id: i32,
    others: &[i32],
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::JoinedGame.as_u8());
    writer.write_i32(code.value());
    writer.write_i32(client_id);
    writer.write_i32(host_id);
    writer.write_packed_u32(others.len() as u32);
    for &id in others {
        writer.write_packed_i32(id);
    }
    writer.end_message()
}

pub fn write_remove_player(
    writer: &mut MessageWriter,
    code: GameCode,
    client_id: i32,
    host_id: i32,
    reason: DisconnectReason,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::RemovePlayer.as_u8());
    writer.write_i32(code.value());
    writer.write_i32(client_id);
    writer.write_i32(host_id);
    writer.write_u8(reason.as_u8());
    writer.end_message()
}

pub fn write_alter_game(
    writer: &mut MessageWriter,
    code: GameCode,
    is_public: bool,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::AlterGame.as_u8());
    writer.write_i32(code.value());
    writer.write_u8(AlterGameTag::ChangePrivacy.as_u8());
    writer.write_bool(is_public);
    writer.end_message()
}

pub fn write_start_game(writer: &mut MessageWriter, code: GameCode) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::StartGame.as_u8());
    writer.write_i32(code.value());
    writer.end_message()
}

pub fn write_end_game(
    writer: &mut MessageWriter,
    code: GameCode,
    reason: GameOverReason,
    show_ad: bool,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::EndGame.as_u8());
    writer.write_i32(code.value());
    writer.write_u8(reason.as_u8());
    writer.write_bool(show_ad);
    writer.end_message()
}

pub fn write_wait_for_host(
    writer: &mut MessageWriter,
    code: GameCode,
    client_id: i32,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::WaitForHost.as_u8());
    writer.write_i32(code.value());
    writer.write_i32(client_id);
    writer.end_message()
}

pub fn write_kick_player(
    writer: &mut MessageWriter,
    code: GameCode,
    client_id: i32,
    is_ban: bool,
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::KickPlayer.as_u8());
    writer.write_i32(code.value());
    writer.write_packed_i32(client_id);
    writer.write_bool(is_ban);
    writer.end_message()
}

/// Wraps already-encoded sub-messages in a GameData message.
pub fn write_game_data(
    writer: &mut MessageWriter,
    code: GameCode,
    sub_messages: &[u8],
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::GameData.as_u8());
    writer.write_i32(code.value());
    writer.write_bytes(sub_messages);
    writer.end_message()
}

/// Wraps already-encoded sub-messages in a GameDataTo message.
pub fn write_game_data_to(
    writer: &mut MessageWriter,
    code: GameCode,
    target: i32,
    sub_messages: &[u8],
) -> Result<(), CodecError> {
    writer.start_message(MessageFlag::GameDataTo.as_u8());
    writer.write_i32(code.value());
    writer.write_packed_i32(target);
    writer.write_bytes(sub_messages);
    writer.end_message()
}

/// Sub-message builders for GameData payloads
pub mod game_data {
    use super::*;

    pub fn write_data(
        writer: &mut MessageWriter,
        handle: u32,
        body: &[u8],
    ) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::DataFlag.as_u8());
        writer.write_packed_u32(handle);
        writer.write_bytes(body);
        writer.end_message()
    }

    pub fn write_rpc(
        writer: &mut MessageWriter,
        handle: u32,
        call_id: u8,
        body: &[u8],
    ) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::RpcFlag.as_u8());
        writer.write_packed_u32(handle);
        writer.write_u8(call_id);
        writer.write_bytes(body);
        writer.end_message()
    }

    /// Spawn of one prefab; each component is its handle plus initial snapshot.
    pub fn write_spawn(
        writer: &mut MessageWriter,
        prefab_id: u32,
        owner_id: i32,
        flags: SpawnFlags,
        components: &[(u32, &[u8])],
    ) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::SpawnFlag.as_u8());
        writer.write_packed_u32(prefab_id);
        writer.write_packed_i32(owner_id);
        writer.write_u8(flags.0);
        writer.write_packed_u32(components.len() as u32);
        for &(handle, snapshot) in components {
            writer.write_packed_u32(handle);
            writer.start_message(1);
            writer.write_bytes(snapshot);
            writer.end_message()?;
        }
        writer.end_message()
    }

    pub fn write_despawn(writer: &mut MessageWriter, handle: u32) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::DespawnFlag.as_u8());
        writer.write_packed_u32(handle);
        writer.end_message()
    }

    pub fn write_scene_change(
        writer: &mut MessageWriter,
        client_id: i32,
        scene: &str,
    ) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::SceneChangeFlag.as_u8());
        writer.write_packed_i32(client_id);
        writer.write_string(scene);
        writer.end_message()
    }

    pub fn write_ready(writer: &mut MessageWriter, client_id: i32) -> Result<(), CodecError> {
        writer.start_message(GameDataTag::ReadyFlag.as_u8());
        writer.write_packed_i32(client_id);
        writer.end_message()
    }
}

/// Root messages a client can receive from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    HostGame {
        code: GameCode,
    },
    JoinGame {
        code: GameCode,
        client_id: i32,
        host_id: i32,
    },
    JoinGameError {
        reason: i32,
    },
    JoinedGame {
        code: GameCode,
        client_id: i32,
        host_id: i32,
        others: Vec<i32>,
    },
    RemovePlayer {
        code: GameCode,
        client_id: i32,
        host_id: i32,
        reason: u8,
    },
    AlterGame {
        code: GameCode,
        tag: u8,
        is_public: bool,
    },
    StartGame {
        code: GameCode,
    },
    EndGame {
        code: GameCode,
        reason: u8,
        show_ad: bool,
    },
    WaitForHost {
        code: GameCode,
        client_id: i32,
    },
    KickPlayer {
        code: GameCode,
        client_id: i32,
        is_ban: bool,
    },
    GameData {
        code: GameCode,
        sub_messages: Vec<u8>,
    },
    GameDataTo {
        code: GameCode,
        target: i32,
        sub_messages: Vec<u8>,
    },
    Unknown {
        tag: u8,
    },
}

impl ServerMessage {
    /// Decodes every root message in a payload.
    pub fn decode_all(payload: &[u8]) -> Result<Vec<Self>, CodecError> {
        let mut reader = MessageReader::new(payload);
        let mut messages = Vec::new();
        while reader.has_remaining() {
            let mut message = reader.read_message()?;
            messages.push(Self::decode(&mut message)?);
        }
        Ok(messages)
    }

    pub fn decode(reader: &mut MessageReader<'_>) -> Result<Self, CodecError> {
        let Some(flag) = MessageFlag::from_u8(reader.tag()) else {
            return Ok(Self::Unknown { tag: reader.tag() });
        };

        let message = match flag {
            MessageFlag::HostGame => Self::HostGame {
                code: GameCode(reader.read_i32()?),
            },
            MessageFlag::JoinGame if reader.len() == 4 => Self::JoinGameError {
                reason: reader.read_i32()?,
            },
            MessageFlag::JoinGame => Self::JoinGame {
                code: GameCode(reader.read_i32()?),
                client_id: reader.read_i32()?,
                host_id: reader.read_i32()?,
            },
            MessageFlag::JoinedGame => {
                let code = GameCode(reader.read_i32()?);
                let client_id = reader.read_i32()?;
                let host_id = reader.read_i32()?;
                let count = reader.read_packed_u32()?;
                let mut others = Vec::new();
                for _ in 0..count {
                    others.push(reader.read_packed_i32()?);
                }
                Self::JoinedGame {
                    code,
                    client_id,
                    host_id,
                    others,
                }
            }
            MessageFlag::RemovePlayer => Self::RemovePlayer {
                code: GameCode(reader.read_i32()?),
                client_id: reader.read_i32()?,
                host_id: reader.read_i32()?,
                reason: reader.read_u8()?,
            },
            MessageFlag::AlterGame => Self::AlterGame {
                code: GameCode(reader.read_i32()?),
                tag: reader.read_u8()?,
                is_public: reader.read_bool()?,
            },
            MessageFlag::StartGame => Self::StartGame {
                code: GameCode(reader.read_i32()?),
            },
            MessageFlag::EndGame => Self::EndGame {
                code: GameCode(reader.read_i32()?),
                reason: reader.read_u8()?,
                show_ad: reader.read_bool()?,
            },
            MessageFlag::WaitForHost => Self::WaitForHost {
                code: GameCode(reader.read_i32()?),
                client_id: reader.read_i32()?,
            },
            MessageFlag::KickPlayer => Self::KickPlayer {
                code: GameCode(reader.read_i32()?),
                client_id: reader.read_packed_i32()?,
                is_ban: reader.read_bool()?,
            },
            MessageFlag::GameData => Self::GameData {
                code: GameCode(reader.read_i32()?),
                sub_messages: reader.remaining_bytes().to_vec(),
            },
            MessageFlag::GameDataTo => Self::GameDataTo {
                code: GameCode(reader.read_i32()?),
                target: reader.read_packed_i32()?,
                sub_messages: reader.remaining_bytes().to_vec(),
            },
            MessageFlag::RemoveGame => Self::Unknown { tag: reader.tag() },
        };

        Ok(message)
    }
}
