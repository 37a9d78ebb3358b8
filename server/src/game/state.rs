use super::{Bootstrap, ClientPlayer, Game, GameEvent, GameState, LimboState, Outbox};
use log::{debug, info, warn};
use shared::messages::{self, game_data};
use shared::protocol::{
    DisconnectReason, GameOverReason, MessageFlag, ONLINE_GAME_SCENE, PLACEHOLDER_CLIENT_ID,
};
use std::net::SocketAddr;
use thiserror::Error;

/// Why a join was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("game has already started")]
    GameStarted,
    #[error("game is full")]
    GameFull,
    #[error("address is banned from this game")]
    Banned,
    #[error("game no longer exists")]
    GameDestroyed,
    #[error("client is already in this game")]
    AlreadyJoined,
}

impl JoinError {
    pub fn disconnect_reason(self) -> DisconnectReason {
        match self {
            JoinError::GameStarted => DisconnectReason::GameStarted,
            JoinError::GameFull => DisconnectReason::GameFull,
            JoinError::Banned => DisconnectReason::Banned,
            JoinError::GameDestroyed => DisconnectReason::GameNotFound,
            JoinError::AlreadyJoined => DisconnectReason::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Disconnect,
    Kick,
    Ban,
}

impl LeaveReason {
    fn disconnect_reason(self) -> DisconnectReason {
        match self {
            LeaveReason::Disconnect => DisconnectReason::ExitGame,
            LeaveReason::Kick => DisconnectReason::Kicked,
            LeaveReason::Ban => DisconnectReason::Banned,
        }
    }
}

impl Game {
    /// Seats a client, or re-seats a player returning after a match.
    ///
    /// The first player to join becomes host.
    pub fn add_player(
        &mut self,
        client_id: i32,
        name: String,
        addr: SocketAddr,
        out: &mut Outbox,
    ) -> Result<(), JoinError> {
        if self.state == GameState::Destroyed {
            return Err(JoinError::GameDestroyed);
        }

        match self.player_mut(client_id) {
            Some(player) if player.limbo == LimboState::NotLimbo => {
                return Err(JoinError::AlreadyJoined)
            }
            Some(player) => {
                player.addr = addr;
                player.name = name;
                info!("{} - Client {} rejoined", self.code, client_id);
            }
            None => {
                if self.banned.contains(&addr.ip()) {
                    return Err(JoinError::Banned);
                }
                if self.state == GameState::Started {
                    return Err(JoinError::GameStarted);
                }
                if self.players.len() >= self.max_players {
                    return Err(JoinError::GameFull);
                }

                info!("{} - Client {} ({}) joined", self.code, client_id, name);
                self.players.push(ClientPlayer {
                    client_id,
                    name,
                    addr,
                    scene: None,
                    limbo: LimboState::WaitingForServer,
                });
                out.events.push(GameEvent::PlayerJoined { client_id });
            }
        }

        if self.host_id.is_none() {
            self.host_id = Some(client_id);
            out.events.push(GameEvent::HostChanged { client_id });
        }

        if self.state == GameState::Ended {
            self.join_game_next(client_id, out);
        } else {
            self.join_game_new(client_id, out);
        }
        Ok(())
    }

    /// Places a player into the live lobby.
    fn join_game_new(&mut self, client_id: i32, out: &mut Outbox) {
        let Some(player) = self.player_mut(client_id) else {
            return;
        };
        player.limbo = LimboState::NotLimbo;

        let code = self.code;
        let host_id = self.host_id.unwrap_or(client_id);

        self.broadcast(
            out,
            |p| p.client_id != client_id,
            |w| messages::write_join_game(w, code, client_id, host_id),
        );
        self.send_joined(client_id, out);

        if self.bootstrap == Bootstrap::Idle && self.is_host(client_id) {
            self.bootstrap = Bootstrap::AwaitingSpawn;
            debug!("{} - Announcing placeholder player to host {}", code, client_id);
            self.send_to(out, client_id, |w| {
                messages::write_join_game(w, code, PLACEHOLDER_CLIENT_ID, host_id)?;

                w.start_message(MessageFlag::GameData.as_u8());
                w.write_i32(code.value());
                game_data::write_scene_change(w, PLACEHOLDER_CLIENT_ID, ONLINE_GAME_SCENE)?;
                w.end_message()
            });
        }
    }

    /// JoinedGame plus the current privacy flag.
    fn send_joined(&self, client_id: i32, out: &mut Outbox) {
        let code = self.code;
        let host_id = self.host_id.unwrap_or(client_id);
        let is_public = self.is_public;
        let others: Vec<i32> = self
            .players
            .iter()
            .map(|p| p.client_id)
            .filter(|&id| id != client_id)
            .collect();

        self.send_to(out, client_id, |w| {
            messages::write_joined_game(w, code, client_id, host_id, &others)?;
            messages::write_alter_game(w, code, is_public)
        });
    }

    /// Rejoin after a match has ended.
    fn join_game_next(&mut self, client_id: i32, out: &mut Outbox) {
        if self.is_host(client_id) {
            info!("{} - Host {} is back, reopening the lobby", self.code, client_id);
            self.state = GameState::NotStarted;
            self.join_game_new(client_id, out);
            self.check_limbo_players(out);
            return;
        }

        if let Some(player) = self.player_mut(client_id) {
            player.limbo = LimboState::WaitingForHost;
        }
        let code = self.code;
        self.send_to(out, client_id, |w| {
            messages::write_wait_for_host(w, code, client_id)
        });
    }

    /// Releases every player waiting for the host.
    fn check_limbo_players(&mut self, out: &mut Outbox) {
        let waiting: Vec<i32> = self
            .players
            .iter()
            .filter(|p| p.limbo == LimboState::WaitingForHost)
            .map(|p| p.client_id)
            .collect();

        if waiting.is_empty() {
            return;
        }

        // Objects the host has already re-spawned.
        let code = self.code;
        let resync = match self.encode_data_batch() {
            Ok(batch) => batch,
            Err(e) => {
                warn!("{} - Could not build resync batch: {}", code, e);
                Vec::new()
            }
        };

        for client_id in waiting {
            self.send_joined(client_id, out);
            if !resync.is_empty() {
                self.send_to(out, client_id, |w| {
                    messages::write_game_data(w, code, &resync)
                });
            }
            if let Some(player) = self.player_mut(client_id) {
                player.limbo = LimboState::NotLimbo;
            }
        }
    }

    /// Removes a player; returns `false` if it was not seated.
    pub fn remove_player(&mut self, client_id: i32, reason: LeaveReason, out: &mut Outbox) -> bool {
        let Some(index) = self.players.iter().position(|p| p.client_id == client_id) else {
            return false;
        };
        let player = self.players.remove(index);
        let banned = reason == LeaveReason::Ban;

        info!(
            "{} - Client {} ({}) left ({:?})",
            self.code, client_id, player.name, reason
        );
        out.events.push(GameEvent::PlayerLeft { client_id, banned });

        if banned {
            self.banned.insert(player.addr.ip());
        }

        if self.players.is_empty() {
            self.destroy(out);
            return true;
        }

        if self.is_host(client_id) {
            self.migrate_host(out);
        }

        let code = self.code;
        let host_id = self.host_id.unwrap_or(-1);
        let reason = reason.disconnect_reason();
        self.broadcast(
            out,
            |_| true,
            |w| messages::write_remove_player(w, code, client_id, host_id, reason),
        );
        true
    }

    fn migrate_host(&mut self, out: &mut Outbox) {
        let Some(host) = self.players.first() else {
            self.destroy(out);
            return;
        };
        let (client_id, limbo) = (host.client_id, host.limbo);

        self.host_id = Some(client_id);
        info!("{} - Assigned {} as new host", self.code, client_id);
        out.events.push(GameEvent::HostChanged { client_id });

        if self.state == GameState::Ended && limbo == LimboState::WaitingForHost {
            self.state = GameState::NotStarted;
            self.join_game_new(client_id, out);
            self.check_limbo_players(out);
        }
    }

    /// Destroys a game nobody is seated in; returns whether it did.
    pub fn close_if_empty(&mut self, out: &mut Outbox) -> bool {
        if !self.players.is_empty() || self.state == GameState::Destroyed {
            return false;
        }
        debug!("{} - Closing unjoined game", self.code);
        self.destroy(out);
        true
    }

    fn destroy(&mut self, out: &mut Outbox) {
        if self.state == GameState::Destroyed {
            return;
        }
        info!("{} - Game destroyed", self.code);

        self.state = GameState::Destroyed;
        self.host_id = None;
        self.players.clear();
        self.clear_objects(out);
        out.events.push(GameEvent::Destroyed);
    }

    fn clear_objects(&mut self, out: &mut Outbox) {
        for (handle, object) in self.objects.clear() {
            out.events.push(GameEvent::ObjectDestroyed {
                handle,
                kind: object.kind(),
                owner_id: object.owner_id,
            });
        }
    }

    pub fn start(&mut self, sender_id: i32, out: &mut Outbox) -> bool {
        if !self.is_host(sender_id) {
            warn!("{} - Client {} tried to start as non-host", self.code, sender_id);
            return false;
        }
        if self.state != GameState::NotStarted {
            warn!("{} - Cannot start from {:?}", self.code, self.state);
            return false;
        }

        self.state = GameState::Started;
        info!("{} - Game started", self.code);

        let code = self.code;
        self.broadcast(out, |_| true, |w| messages::write_start_game(w, code));
        true
    }

    pub fn end(&mut self, sender_id: i32, reason: GameOverReason, out: &mut Outbox) -> bool {
        if !self.is_host(sender_id) {
            warn!("{} - Client {} tried to end as non-host", self.code, sender_id);
            return false;
        }
        if self.state != GameState::Started {
            warn!("{} - Cannot end from {:?}", self.code, self.state);
            return false;
        }

        self.state = GameState::Ended;
        info!("{} - Game ended ({:?})", self.code, reason);

        for player in &mut self.players {
            player.limbo = LimboState::WaitingForServer;
        }

        let code = self.code;
        self.broadcast(
            out,
            |_| true,
            |w| messages::write_end_game(w, code, reason, false),
        );
        self.clear_objects(out);
        true
    }

    pub fn set_public(&mut self, sender_id: i32, is_public: bool, out: &mut Outbox) -> bool {
        if !self.is_host(sender_id) {
            warn!(
                "{} - Client {} tried to alter the game as non-host",
                self.code, sender_id
            );
            return false;
        }

        self.is_public = is_public;
        let code = self.code;
        self.broadcast(
            out,
            |p| p.client_id != sender_id,
            |w| messages::write_alter_game(w, code, is_public),
        );
        true
    }

    /// Kicks or bans `target`; the host cannot kick itself.
    pub fn kick(&mut self, sender_id: i32, target: i32, ban: bool, out: &mut Outbox) -> bool {
        if !self.is_host(sender_id) {
            warn!("{} - Client {} tried to kick as non-host", self.code, sender_id);
            return false;
        }
        if target == sender_id || self.player(target).is_none() {
            warn!("{} - Host cannot kick client {}", self.code, target);
            return false;
        }

        let code = self.code;
        self.broadcast(
            out,
            |_| true,
            |w| messages::write_kick_player(w, code, target, ban),
        );

        let reason = if ban { LeaveReason::Ban } else { LeaveReason::Kick };
        self.remove_player(target, reason, out)
    }
}
