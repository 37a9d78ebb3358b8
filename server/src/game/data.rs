//! GameData dispatcher
//!
//! A GameData payload is a run of `[u16 len][u8 tag][body]` sub-messages,
//! optionally preceded by a packed target client id. Each sub-message is
//! applied on its own: a malformed one is logged and skipped, and an earlier
//! one is never rolled back. Only two outcomes abort the whole payload: an
//! unknown target, and a sender breaking the authority rules.

use super::{Bootstrap, Game, GameEvent, Outbox};
use crate::net_objects::{NetObject, NetObjectError};
use crate::spawn_catalog;
use log::{debug, error, trace, warn};
use shared::codec::{CodecError, MessageReader};
use shared::messages;
use shared::protocol::{
    DisconnectReason, GameDataTag, SpawnFlags, CURRENT_CLIENT_ID, PLACEHOLDER_CLIENT_ID,
};
use shared::GameCode;
use thiserror::Error;

/// Reasons a whole GameData payload is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameDataError {
    #[error("payload addressed to unknown player {0}")]
    UnknownTarget(i32),

    /// The sender should be treated as misbehaving.
    #[error("client {client_id} violated the protocol: {reason}")]
    ProtocolViolation {
        client_id: i32,
        reason: &'static str,
    },
}

/// Where an accepted payload should be forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Broadcast,
    Player(i32),
    /// Swallowed by the server.
    Consumed,
}

enum DispatchError {
    Rejected(GameDataError),
    Codec(CodecError),
}

impl From<CodecError> for DispatchError {
    fn from(e: CodecError) -> Self {
        DispatchError::Codec(e)
    }
}

impl From<GameDataError> for DispatchError {
    fn from(e: GameDataError) -> Self {
        DispatchError::Rejected(e)
    }
}

fn violation(client_id: i32, reason: &'static str) -> DispatchError {
    DispatchError::Rejected(GameDataError::ProtocolViolation { client_id, reason })
}

fn log_object_error(code: GameCode, handle: u32, e: &NetObjectError) {
    match e {
        NetObjectError::NotImplemented { .. } => trace!("{} - Object {}: {}", code, handle, e),
        NetObjectError::UnknownRpc { .. } => debug!("{} - Object {}: {}", code, handle, e),
        NetObjectError::Codec(_) => warn!("{} - Object {} rejected its data: {}", code, handle, e),
    }
}

impl Game {
    /// Applies one GameData payload sent by `sender_id`.
    ///
    /// With `to_player` the payload starts with a packed target id. On
    /// success the returned [`Delivery`] says who should receive a copy.
    pub fn handle_game_data(
        &mut self,
        sender_id: i32,
        reader: &mut MessageReader<'_>,
        to_player: bool,
        out: &mut Outbox,
    ) -> Result<Delivery, GameDataError> {
        let mut delivery = Delivery::Broadcast;

        if to_player {
            let target = reader
                .read_packed_i32()
                .map_err(|_| GameDataError::ProtocolViolation {
                    client_id: sender_id,
                    reason: "missing target",
                })?;

            if target == PLACEHOLDER_CLIENT_ID
                && self.bootstrap == Bootstrap::AwaitingSpawn
                && self.is_host(sender_id)
            {
                self.retire_placeholder(sender_id, out);
                delivery = Delivery::Consumed;
            } else if self.player(target).is_none() {
                warn!(
                    "{} - Client {} sent GameData to unknown player {}",
                    self.code, sender_id, target
                );
                return Err(GameDataError::UnknownTarget(target));
            } else {
                trace!("{} - GameData for target {}", self.code, target);
                delivery = Delivery::Player(target);
            }
        }

        while reader.has_remaining() {
            let mut message = match reader.read_message() {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        "{} - Truncated GameData envelope from client {}: {}",
                        self.code, sender_id, e
                    );
                    break;
                }
            };

            let tag = message.tag();
            match self.dispatch(sender_id, &mut message, out) {
                Ok(()) => {}
                Err(DispatchError::Rejected(e)) => return Err(e),
                Err(DispatchError::Codec(e)) => warn!(
                    "{} - Malformed GameData tag {} from client {}: {}",
                    self.code, tag, sender_id, e
                ),
            }
        }

        Ok(delivery)
    }

    fn retire_placeholder(&mut self, host_id: i32, out: &mut Outbox) {
        self.bootstrap = Bootstrap::Done;
        debug!("{} - Bootstrap spawn received, retiring placeholder", self.code);

        let code = self.code;
        self.send_to(out, host_id, |w| {
            messages::write_remove_player(
                w,
                code,
                PLACEHOLDER_CLIENT_ID,
                host_id,
                DisconnectReason::ExitGame,
            )
        });
    }

    fn dispatch(
        &mut self,
        sender_id: i32,
        message: &mut MessageReader<'_>,
        out: &mut Outbox,
    ) -> Result<(), DispatchError> {
        let code = self.code;

        match GameDataTag::from_u8(message.tag()) {
            Some(GameDataTag::DataFlag) => {
                let handle = message.read_packed_u32()?;
                match self.objects.find_mut(handle) {
                    Some(object) => {
                        if let Err(e) = object.decode_delta(sender_id, message, false) {
                            log_object_error(code, handle, &e);
                        }
                    }
                    None => warn!("{} - DataFlag for unregistered handle {}", code, handle),
                }
            }
            Some(GameDataTag::RpcFlag) => {
                let handle = message.read_packed_u32()?;
                let Some(object) = self.objects.find_mut(handle) else {
                    warn!("{} - RpcFlag for unregistered handle {}", code, handle);
                    return Ok(());
                };
                let call_id = message.read_u8()?;
                if let Err(e) = object.handle_remote_call(sender_id, call_id, message) {
                    log_object_error(code, handle, &e);
                }
            }
            Some(GameDataTag::SpawnFlag) => self.handle_spawn(sender_id, message, out)?,
            Some(GameDataTag::DespawnFlag) => self.handle_despawn(sender_id, message, out)?,
            Some(GameDataTag::SceneChangeFlag) => {
                let client_id = message.read_packed_i32()?;
                if client_id != sender_id {
                    warn!(
                        "{} - Client {} tried to change the scene of client {}",
                        code, sender_id, client_id
                    );
                    return Err(violation(sender_id, "scene change for another player"));
                }

                let scene = message.read_string()?;
                trace!("{} - Client {} moved to scene {}", code, sender_id, scene);
                if let Some(player) = self.player_mut(sender_id) {
                    player.scene = Some(scene);
                }
            }
            Some(GameDataTag::ReadyFlag) => {
                let client_id = message.read_packed_i32()?;
                trace!("{} - Client {} is ready", code, client_id);
            }
            _ => trace!("{} - Ignoring GameData tag {}", code, message.tag()),
        }

        Ok(())
    }

    fn handle_spawn(
        &mut self,
        sender_id: i32,
        message: &mut MessageReader<'_>,
        out: &mut Outbox,
    ) -> Result<(), DispatchError> {
        let code = self.code;
        if !self.is_host(sender_id) {
            warn!("{} - Client {} tried to spawn as non-host", code, sender_id);
            return Err(violation(sender_id, "spawn from non-host"));
        }

        let prefab_id = message.read_packed_u32()?;
        let prefab = match spawn_catalog::lookup(prefab_id) {
            Ok(prefab) => prefab,
            Err(e) => {
                error!("{} - Cannot spawn: {}", code, e);
                return Ok(());
            }
        };

        let mut owner_id = message.read_packed_i32()?;
        if owner_id == CURRENT_CLIENT_ID {
            owner_id = sender_id;
        }
        let spawn_flags = SpawnFlags(message.read_u8()?);

        let declared = message.read_packed_u32()?;
        if declared as usize != prefab.components.len() {
            error!(
                "{} - Prefab {} declares {} components, expected {}",
                code,
                prefab.name,
                declared,
                prefab.components.len()
            );
            return Ok(());
        }

        debug!(
            "{} - Spawning {} for owner {} (flags {:#04x})",
            code, prefab.name, owner_id, spawn_flags.0
        );

        for &kind in prefab.components {
            let handle = message.read_packed_u32()?;

            let mut object = NetObject::new(kind);
            object.handle = handle;
            object.owner_id = owner_id;
            object.spawn_flags = spawn_flags;

            let key = match self.objects.add(object) {
                Ok(key) => key,
                Err(e) => {
                    warn!("{} - {} not spawned: {}", code, prefab.name, e);
                    break;
                }
            };
            debug!("{} - {:?} {} owned by {}", code, kind, handle, owner_id);
            out.events.push(GameEvent::ObjectSpawned {
                handle,
                kind,
                owner_id,
            });

            let mut snapshot = message.read_message()?;
            if let Some(object) = self.objects.get_mut(key) {
                if let Err(e) = object.decode_delta(sender_id, &mut snapshot, true) {
                    log_object_error(code, handle, &e);
                }
            }
        }

        Ok(())
    }

    fn handle_despawn(
        &mut self,
        sender_id: i32,
        message: &mut MessageReader<'_>,
        out: &mut Outbox,
    ) -> Result<(), DispatchError> {
        let code = self.code;
        let handle = message.read_packed_u32()?;

        let Some(object) = self.objects.find(handle) else {
            warn!(
                "{} - Client {} despawned unregistered handle {}",
                code, sender_id, handle
            );
            return Ok(());
        };

        if object.owner_id != sender_id && !self.is_host(sender_id) {
            warn!(
                "{} - Client {} may not despawn {} owned by {}",
                code, sender_id, handle, object.owner_id
            );
            return Err(violation(sender_id, "despawn of a foreign object"));
        }

        if let Some(object) = self.objects.remove(handle) {
            debug!("{} - Destroyed {:?} {}", code, object.kind(), handle);
            out.events.push(GameEvent::ObjectDestroyed {
                handle,
                kind: object.kind(),
                owner_id: object.owner_id,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::LimboState;
    use super::*;
    use crate::net_objects::{NetObjectKind, NetObjectState};
    use shared::codec::MessageWriter;
    use shared::messages::{game_data, ServerMessage};
    use shared::protocol::{RpcCall, GLOBAL_OWNER_ID, ONLINE_GAME_SCENE};

    fn dispatch(
        game: &mut Game,
        sender_id: i32,
        payload: &[u8],
        out: &mut Outbox,
    ) -> Result<Delivery, GameDataError> {
        let mut reader = MessageReader::new(payload);
        game.handle_game_data(sender_id, &mut reader, false, out)
    }

    fn dispatch_to(
        game: &mut Game,
        sender_id: i32,
        target: i32,
        sub_messages: &[u8],
        out: &mut Outbox,
    ) -> Result<Delivery, GameDataError> {
        let mut writer = MessageWriter::new();
        writer.write_packed_i32(target);
        writer.write_bytes(sub_messages);
        let payload = writer.into_bytes();
        let mut reader = MessageReader::new(&payload);
        game.handle_game_data(sender_id, &mut reader, true, out)
    }

    fn spawn(prefab_id: u32, owner_id: i32, components: &[(u32, &[u8])]) -> Vec<u8> {
        let mut writer = MessageWriter::new();
        game_data::write_spawn(&mut writer, prefab_id, owner_id, SpawnFlags::NONE, components)
            .unwrap();
        writer.into_bytes()
    }

    fn despawn(handle: u32) -> Vec<u8> {
        let mut writer = MessageWriter::new();
        game_data::write_despawn(&mut writer, handle).unwrap();
        writer.into_bytes()
    }

    fn player_prefab(owner_id: i32, first_handle: u32) -> Vec<u8> {
        spawn(
            4,
            owner_id,
            &[
                (first_handle, &[0, 1]),
                (first_handle + 1, &[]),
                (first_handle + 2, &[]),
            ],
        )
    }

    #[test]
    fn test_spawn_then_despawn_fires_events_once() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        dispatch(&mut game, 1, &spawn(2, GLOBAL_OWNER_ID, &[(10, &[])]), &mut out).unwrap();
        assert!(game.objects().contains(10));

        dispatch(&mut game, 1, &despawn(10), &mut out).unwrap();
        assert!(game.objects().is_empty());

        assert_eq!(
            out.events,
            vec![
                GameEvent::ObjectSpawned {
                    handle: 10,
                    kind: NetObjectKind::LobbyBehaviour,
                    owner_id: GLOBAL_OWNER_ID
                },
                GameEvent::ObjectDestroyed {
                    handle: 10,
                    kind: NetObjectKind::LobbyBehaviour,
                    owner_id: GLOBAL_OWNER_ID
                },
            ]
        );
    }

    #[test]
    fn test_spawn_registers_components_in_catalog_order() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        dispatch(&mut game, 1, &player_prefab(2, 20), &mut out).unwrap();

        let kinds: Vec<NetObjectKind> = (20..23)
            .map(|h| game.objects().find(h).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                NetObjectKind::PlayerControl,
                NetObjectKind::PlayerPhysics,
                NetObjectKind::CustomNetworkTransform
            ]
        );
        assert!(game.objects().iter().all(|o| o.owner_id == 2));

        let NetObjectState::PlayerControl(state) = &game.objects().find(20).unwrap().state else {
            panic!("wrong state kind");
        };
        assert_eq!(state.player_id, 1);
    }

    #[test]
    fn test_spawn_resolves_current_client_owner() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        dispatch(&mut game, 1, &spawn(2, CURRENT_CLIENT_ID, &[(3, &[])]), &mut out).unwrap();
        assert_eq!(game.objects().find(3).unwrap().owner_id, 1);
    }

    #[test]
    fn test_spawn_count_mismatch_leaves_registry_unchanged() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        // The player prefab has three components, only two declared.
        let bad = spawn(4, 1, &[(20, &[]), (21, &[])]);
        let good = spawn(2, GLOBAL_OWNER_ID, &[(30, &[])]);
        let payload = [bad, good].concat();

        dispatch(&mut game, 1, &payload, &mut out).unwrap();
        assert_eq!(game.objects().len(), 1);
        assert!(game.objects().contains(30));
        assert!(!game.objects().contains(20));
    }

    #[test]
    fn test_unknown_prefab_is_skipped() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let payload = [spawn(42, 1, &[(5, &[])]), spawn(2, 1, &[(6, &[])])].concat();
        assert_eq!(dispatch(&mut game, 1, &payload, &mut out), Ok(Delivery::Broadcast));
        assert!(!game.objects().contains(5));
        assert!(game.objects().contains(6));
    }

    #[test]
    fn test_duplicate_handle_truncates_spawn() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        dispatch(&mut game, 1, &spawn(2, 1, &[(21, &[])]), &mut out).unwrap();
        out.events.clear();

        // Second component collides with the lobby.
        dispatch(&mut game, 1, &player_prefab(1, 20), &mut out).unwrap();

        assert!(game.objects().contains(20));
        assert_eq!(game.objects().find(21).unwrap().kind(), NetObjectKind::LobbyBehaviour);
        assert!(!game.objects().contains(22));
        assert_eq!(out.events.len(), 1);
    }

    #[test]
    fn test_spawn_by_non_host_is_rejected() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let result = dispatch(&mut game, 2, &spawn(2, 2, &[(10, &[])]), &mut out);
        assert_eq!(
            result,
            Err(GameDataError::ProtocolViolation {
                client_id: 2,
                reason: "spawn from non-host"
            })
        );
        assert!(game.objects().is_empty());
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_despawn_authority() {
        let mut game = game_with(&[1, 2, 3]);
        let mut out = Outbox::new();

        dispatch(&mut game, 1, &spawn(2, 2, &[(10, &[])]), &mut out).unwrap();
        dispatch(&mut game, 1, &spawn(2, 2, &[(11, &[])]), &mut out).unwrap();

        // Neither host nor owner.
        let result = dispatch(&mut game, 3, &despawn(10), &mut out);
        assert!(matches!(result, Err(GameDataError::ProtocolViolation { client_id: 3, .. })));
        assert_eq!(game.objects().len(), 2);

        // Owner.
        dispatch(&mut game, 2, &despawn(10), &mut out).unwrap();
        assert!(!game.objects().contains(10));

        // Host.
        dispatch(&mut game, 1, &despawn(11), &mut out).unwrap();
        assert!(game.objects().is_empty());
    }

    #[test]
    fn test_despawn_unknown_handle_is_not_fatal() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let payload = [despawn(99), spawn(2, 1, &[(5, &[])])].concat();
        dispatch(&mut game, 1, &payload, &mut out).unwrap();
        assert!(game.objects().contains(5));
    }

    #[test]
    fn test_scene_change_must_name_sender() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let mut writer = MessageWriter::new();
        game_data::write_scene_change(&mut writer, 1, "Lobby").unwrap();
        let result = dispatch(&mut game, 2, writer.as_bytes(), &mut out);

        assert!(matches!(result, Err(GameDataError::ProtocolViolation { client_id: 2, .. })));
        assert_eq!(game.player(2).unwrap().scene, None);
        assert_eq!(game.player(1).unwrap().scene, None);

        let mut writer = MessageWriter::new();
        game_data::write_scene_change(&mut writer, 2, "Lobby").unwrap();
        dispatch(&mut game, 2, writer.as_bytes(), &mut out).unwrap();
        assert_eq!(game.player(2).unwrap().scene.as_deref(), Some("Lobby"));
    }

    #[test]
    fn test_data_and_rpc_reach_objects() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();
        dispatch(&mut game, 1, &player_prefab(1, 20), &mut out).unwrap();

        let mut writer = MessageWriter::new();
        game_data::write_data(&mut writer, 20, &[9]).unwrap();
        let mut name = MessageWriter::new();
        name.write_string("Coral");
        game_data::write_rpc(&mut writer, 20, RpcCall::SetName.as_u8(), name.as_bytes()).unwrap();
        dispatch(&mut game, 1, writer.as_bytes(), &mut out).unwrap();

        let NetObjectState::PlayerControl(state) = &game.objects().find(20).unwrap().state else {
            panic!("wrong state kind");
        };
        assert_eq!(state.player_id, 9);
        assert_eq!(state.name.as_deref(), Some("Coral"));
    }

    #[test]
    fn test_unhandled_rpc_and_unknown_handles_do_not_abort() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();
        dispatch(&mut game, 1, &player_prefab(1, 20), &mut out).unwrap();

        let mut writer = MessageWriter::new();
        game_data::write_rpc(&mut writer, 20, RpcCall::MurderPlayer.as_u8(), &[]).unwrap();
        game_data::write_rpc(&mut writer, 20, 250, &[]).unwrap();
        game_data::write_rpc(&mut writer, 77, RpcCall::SetName.as_u8(), &[]).unwrap();
        game_data::write_data(&mut writer, 78, &[1, 2]).unwrap();
        game_data::write_data(&mut writer, 20, &[]).unwrap();
        writer.write_bytes(&spawn(2, 1, &[(30, &[])]));

        assert_eq!(
            dispatch(&mut game, 1, writer.as_bytes(), &mut out),
            Ok(Delivery::Broadcast)
        );
        assert!(game.objects().contains(30));
    }

    #[test]
    fn test_malformed_sub_message_is_skipped() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let mut writer = MessageWriter::new();
        // Scene change whose string claims more bytes than it has.
        writer.start_message(GameDataTag::SceneChangeFlag.as_u8());
        writer.write_packed_i32(1);
        writer.write_packed_u32(40);
        writer.write_bytes(b"abc");
        writer.end_message().unwrap();
        writer.write_bytes(&spawn(2, 1, &[(8, &[])]));

        dispatch(&mut game, 1, writer.as_bytes(), &mut out).unwrap();
        assert_eq!(game.player(1).unwrap().scene, None);
        assert!(game.objects().contains(8));
    }

    #[test]
    fn test_truncated_envelope_stops_quietly() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let mut payload = spawn(2, 1, &[(8, &[])]);
        // Header claims a 200 byte body that never arrives.
        payload.extend_from_slice(&[200, 0, GameDataTag::DataFlag.as_u8(), 1]);

        assert_eq!(dispatch(&mut game, 1, &payload, &mut out), Ok(Delivery::Broadcast));
        assert!(game.objects().contains(8));
    }

    #[test]
    fn test_unknown_tags_are_ignored() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let mut writer = MessageWriter::new();
        writer.start_message(GameDataTag::ChangeSettingsFlag.as_u8());
        writer.write_bytes(&[1, 2, 3]);
        writer.end_message().unwrap();
        writer.start_message(200);
        writer.end_message().unwrap();
        game_data::write_ready(&mut writer, 1).unwrap();

        assert_eq!(
            dispatch(&mut game, 1, writer.as_bytes(), &mut out),
            Ok(Delivery::Broadcast)
        );
    }

    #[test]
    fn test_unknown_target_rejects_payload() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let result = dispatch_to(&mut game, 1, 55, &spawn(2, 1, &[(3, &[])]), &mut out);
        assert_eq!(result, Err(GameDataError::UnknownTarget(55)));
        assert!(game.objects().is_empty());
    }

    #[test]
    fn test_known_target() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let result = dispatch_to(&mut game, 2, 1, &[], &mut out);
        assert_eq!(result, Ok(Delivery::Player(1)));
    }

    #[test]
    fn test_bootstrap_spawn_is_captured_once() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let game_data = spawn(3, GLOBAL_OWNER_ID, &[(1, &[0]), (2, &[0])]);
        let result = dispatch_to(&mut game, 1, PLACEHOLDER_CLIENT_ID, &game_data, &mut out);
        assert_eq!(result, Ok(Delivery::Consumed));

        // The spawn itself is still applied.
        assert_eq!(game.objects().find(1).unwrap().kind(), NetObjectKind::GameData);
        assert_eq!(game.objects().find(2).unwrap().kind(), NetObjectKind::VoteBanSystem);

        assert_eq!(
            decoded_for(&out, 1),
            vec![ServerMessage::RemovePlayer {
                code: CODE,
                client_id: PLACEHOLDER_CLIENT_ID,
                host_id: 1,
                reason: DisconnectReason::ExitGame.as_u8()
            }]
        );

        // The placeholder only exists once.
        let mut out = Outbox::new();
        let result = dispatch_to(&mut game, 1, PLACEHOLDER_CLIENT_ID, &[], &mut out);
        assert_eq!(result, Err(GameDataError::UnknownTarget(PLACEHOLDER_CLIENT_ID)));
    }

    #[test]
    fn test_bootstrap_intercept_requires_host() {
        let mut game = game_with(&[1, 2]);
        let mut out = Outbox::new();

        let result = dispatch_to(&mut game, 2, PLACEHOLDER_CLIENT_ID, &[], &mut out);
        assert_eq!(result, Err(GameDataError::UnknownTarget(PLACEHOLDER_CLIENT_ID)));

        let result = dispatch_to(&mut game, 1, PLACEHOLDER_CLIENT_ID, &[], &mut out);
        assert_eq!(result, Ok(Delivery::Consumed));
    }

    #[test]
    fn test_missing_target_is_a_violation() {
        let mut game = game_with(&[1]);
        let mut out = Outbox::new();

        let mut reader = MessageReader::new(&[]);
        let result = game.handle_game_data(1, &mut reader, true, &mut out);
        assert!(matches!(result, Err(GameDataError::ProtocolViolation { .. })));
    }

    #[test]
    fn test_bootstrap_announces_placeholder_to_first_host() {
        let mut game = Game::new(CODE, 10);
        let mut out = Outbox::new();
        game.add_player(1, "host".to_string(), addr(1), &mut out).unwrap();

        let messages = decoded_for(&out, 1);
        assert!(messages.contains(&ServerMessage::JoinGame {
            code: CODE,
            client_id: PLACEHOLDER_CLIENT_ID,
            host_id: 1
        }));

        let mut scene = MessageWriter::new();
        game_data::write_scene_change(&mut scene, PLACEHOLDER_CLIENT_ID, ONLINE_GAME_SCENE).unwrap();
        assert_eq!(
            messages.last(),
            Some(&ServerMessage::GameData {
                code: CODE,
                sub_messages: scene.into_bytes()
            })
        );

        // A second player does not trigger it again.
        let mut out = Outbox::new();
        game.add_player(2, "crew".to_string(), addr(2), &mut out).unwrap();
        assert!(!decoded_for(&out, 1)
            .iter()
            .any(|m| matches!(m, ServerMessage::JoinGame { client_id, .. } if *client_id == PLACEHOLDER_CLIENT_ID)));
        assert_eq!(game.player(2).unwrap().limbo, LimboState::NotLimbo);
    }
}
