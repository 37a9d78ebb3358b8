//! Match-wide player records and the vote-ban tally

use shared::codec::{CodecError, MessageReader, MessageWriter};
use std::collections::BTreeMap;

const FLAG_DISCONNECTED: u8 = 1;
const FLAG_IMPOSTOR: u8 = 2;
const FLAG_DEAD: u8 = 4;

/// One assigned task and whether it has been completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: u32,
    pub complete: bool,
}

impl TaskInfo {
    pub fn decode(reader: &mut MessageReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            id: reader.read_packed_u32()?,
            complete: reader.read_bool()?,
        })
    }
}

/// Per-seat metadata of one match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Seat id, stable for one match and distinct from the client id.
    pub player_id: u8,
    pub name: String,
    pub color_id: u8,
    pub hat_id: u32,
    pub pet_id: u32,
    pub skin_id: u32,
    pub disconnected: bool,
    pub impostor: bool,
    pub dead: bool,
    pub tasks: Vec<TaskInfo>,
}

impl PlayerInfo {
    /// Decodes the record body that follows a seat id.
    pub fn decode(player_id: u8, reader: &mut MessageReader<'_>) -> Result<Self, CodecError> {
        let name = reader.read_string()?;
        let color_id = reader.read_u8()?;
        let hat_id = reader.read_packed_u32()?;
        let pet_id = reader.read_packed_u32()?;
        let skin_id = reader.read_packed_u32()?;
        let flags = reader.read_u8()?;

        let task_count = reader.read_u8()?;
        let mut tasks = Vec::with_capacity(task_count as usize);
        for _ in 0..task_count {
            tasks.push(TaskInfo::decode(reader)?);
        }

        Ok(Self {
            player_id,
            name,
            color_id,
            hat_id,
            pet_id,
            skin_id,
            disconnected: flags & FLAG_DISCONNECTED != 0,
            impostor: flags & FLAG_IMPOSTOR != 0,
            dead: flags & FLAG_DEAD != 0,
            tasks,
        })
    }

    /// Status flags packed the way they travel on the wire.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.disconnected {
            flags |= FLAG_DISCONNECTED;
        }
        if self.impostor {
            flags |= FLAG_IMPOSTOR;
        }
        if self.dead {
            flags |= FLAG_DEAD;
        }
        flags
    }
}

/// Player list of one match
#[derive(Debug, Clone, Default)]
pub struct GameDataState {
    players: Vec<PlayerInfo>,
}

impl GameDataState {
    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    pub fn player(&self, player_id: u8) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Replaces the list with a full snapshot: `packed n, { u8 id, record }*n`.
    ///
    /// A seat id repeated within one snapshot overwrites the earlier record.
    pub(super) fn decode_initial(&mut self, reader: &mut MessageReader<'_>) -> Result<(), CodecError> {
        let count = reader.read_packed_u32()?;
        let mut players: Vec<PlayerInfo> = Vec::new();

        for _ in 0..count {
            let player_id = reader.read_u8()?;
            let info = PlayerInfo::decode(player_id, reader)?;

            match players.iter_mut().find(|p| p.player_id == player_id) {
                Some(existing) => *existing = info,
                None => players.push(info),
            }
        }

        self.players = players;
        Ok(())
    }
}

/// Kick votes: voter client id to the three targets it voted for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteBanState {
    pub votes: BTreeMap<i32, [i32; 3]>,
}

impl VoteBanState {
    /// `u8 n, { i32 clientId, packed vote*3 }*n`; merges into the tally.
    pub(super) fn decode(&mut self, reader: &mut MessageReader<'_>) -> Result<(), CodecError> {
        let count = reader.read_u8()?;
        for _ in 0..count {
            let client_id = reader.read_i32()?;
            let mut votes = [0i32; 3];
            for vote in votes.iter_mut() {
                *vote = reader.read_packed_i32()?;
            }
            self.votes.insert(client_id, votes);
        }
        Ok(())
    }

    pub(super) fn encode(&self, writer: &mut MessageWriter) -> bool {
        let count = self.votes.len().min(u8::MAX as usize);
        writer.write_u8(count as u8);
        for (&client_id, votes) in self.votes.iter().take(count) {
            writer.write_i32(client_id);
            for &vote in votes {
                writer.write_packed_i32(vote);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net_objects::{NetObject, NetObjectKind, NetObjectState};

    fn write_player(writer: &mut MessageWriter, id: u8, name: &str, flags: u8, tasks: &[(u32, bool)]) {
        writer.write_u8(id);
        writer.write_string(name);
        writer.write_u8(3);
        writer.write_packed_u32(10);
        writer.write_packed_u32(300);
        writer.write_packed_u32(2);
        writer.write_u8(flags);
        writer.write_u8(tasks.len() as u8);
        for &(task_id, complete) in tasks {
            writer.write_packed_u32(task_id);
            writer.write_bool(complete);
        }
    }

    #[test]
    fn test_player_info_decode() {
        let mut writer = MessageWriter::new();
        write_player(&mut writer, 0, "blue", 0b110, &[(4, true), (200, false)]);

        let bytes = writer.into_bytes();
        let mut reader = MessageReader::new(&bytes);
        let id = reader.read_u8().unwrap();
        let info = PlayerInfo::decode(id, &mut reader).unwrap();

        assert_eq!(info.name, "blue");
        assert_eq!(info.color_id, 3);
        assert_eq!(info.hat_id, 10);
        assert_eq!(info.pet_id, 300);
        assert_eq!(info.skin_id, 2);
        assert!(!info.disconnected);
        assert!(info.impostor);
        assert!(info.dead);
        assert_eq!(info.flags(), 0b110);
        assert_eq!(
            info.tasks,
            vec![
                TaskInfo { id: 4, complete: true },
                TaskInfo { id: 200, complete: false }
            ]
        );
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_player_info_truncated_tasks() {
        let mut writer = MessageWriter::new();
        write_player(&mut writer, 0, "blue", 0, &[(4, true)]);
        let mut bytes = writer.into_bytes();
        // Claim two tasks while only one follows.
        let count_at = bytes.len() - 3;
        bytes[count_at] = 2;

        let mut reader = MessageReader::new(&bytes);
        let id = reader.read_u8().unwrap();
        assert!(matches!(
            PlayerInfo::decode(id, &mut reader),
            Err(CodecError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_game_data_snapshot() {
        let mut writer = MessageWriter::new();
        writer.write_packed_u32(3);
        write_player(&mut writer, 0, "red", 0, &[]);
        write_player(&mut writer, 1, "blue", 1, &[(1, false)]);
        write_player(&mut writer, 0, "red again", 0, &[]);

        let bytes = writer.into_bytes();
        let mut object = NetObject::new(NetObjectKind::GameData);
        let mut reader = MessageReader::new(&bytes);
        object.decode_delta(1, &mut reader, true).unwrap();

        let NetObjectState::GameData(state) = &object.state else {
            panic!("wrong state kind");
        };
        assert_eq!(state.players().len(), 2);
        assert_eq!(state.player(0).unwrap().name, "red again");
        assert!(state.player(1).unwrap().disconnected);
        assert!(state.player(2).is_none());
    }

    #[test]
    fn test_huge_declared_count_fails_without_allocating() {
        let mut writer = MessageWriter::new();
        writer.write_packed_u32(u32::MAX);
        let bytes = writer.into_bytes();

        let mut state = GameDataState::default();
        let mut reader = MessageReader::new(&bytes);
        assert!(state.decode_initial(&mut reader).is_err());
        assert!(state.players().is_empty());
    }

    #[test]
    fn test_vote_ban_roundtrip() {
        let mut writer = MessageWriter::new();
        writer.write_u8(2);
        writer.write_i32(5);
        for vote in [1, 2, 3] {
            writer.write_packed_i32(vote);
        }
        writer.write_i32(9);
        for vote in [0, 0, 5] {
            writer.write_packed_i32(vote);
        }

        let bytes = writer.into_bytes();
        let mut object = NetObject::new(NetObjectKind::VoteBanSystem);
        let mut reader = MessageReader::new(&bytes);
        object.decode_delta(1, &mut reader, true).unwrap();

        let mut out = MessageWriter::new();
        assert!(object.encode_delta(&mut out, false).unwrap());
        assert_eq!(out.as_bytes(), &bytes[..]);
    }

    #[test]
    fn test_vote_ban_delta_merges() {
        let mut state = VoteBanState::default();
        state.votes.insert(1, [2, 0, 0]);

        let mut writer = MessageWriter::new();
        writer.write_u8(1);
        writer.write_i32(4);
        for vote in [1, 0, 0] {
            writer.write_packed_i32(vote);
        }
        let bytes = writer.into_bytes();
        let mut reader = MessageReader::new(&bytes);
        state.decode(&mut reader).unwrap();

        assert_eq!(state.votes.len(), 2);
        assert_eq!(state.votes[&1], [2, 0, 0]);
        assert_eq!(state.votes[&4], [1, 0, 0]);
    }
}
