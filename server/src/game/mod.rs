//! Per-game state: roster, host authority, lifecycle and the object registry
//!
//! A [`Game`] is plain synchronous state. Every operation takes an
//! [`Outbox`] and appends the messages it wants delivered plus the events it
//! raised; the caller holds the game's lock only while the operation runs and
//! performs the actual sends after releasing it.
//!
//! The GameData dispatcher lives in [`data`] and the join/leave/host
//! migration logic in `state`.

pub mod data;
mod state;

pub use data::{Delivery, GameDataError};
pub use state::{JoinError, LeaveReason};

use crate::net_objects::NetObjectKind;
use crate::registry::NetObjectRegistry;
use log::{error, trace, warn};
use shared::codec::{CodecError, MessageReader, MessageWriter};
use shared::messages;
use shared::protocol::{AlterGameTag, GameOverReason, MessageFlag};
use shared::GameCode;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    Started,
    Ended,
    Destroyed,
}

/// How far a player is from being placed into the live game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimboState {
    NotLimbo,
    WaitingForHost,
    WaitingForServer,
}

/// A connection seated in one game
#[derive(Debug, Clone)]
pub struct ClientPlayer {
    pub client_id: i32,
    pub name: String,
    pub addr: SocketAddr,
    pub scene: Option<String>,
    pub limbo: LimboState,
}

/// One-shot state of the placeholder-player bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bootstrap {
    Idle,
    AwaitingSpawn,
    Done,
}

/// A reliable payload addressed to one player
#[derive(Debug, Clone)]
pub struct Outbound {
    pub client_id: i32,
    pub addr: SocketAddr,
    pub payload: Arc<[u8]>,
}

/// Things that happened inside a game that outer layers react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    ObjectSpawned {
        handle: u32,
        kind: NetObjectKind,
        owner_id: i32,
    },
    ObjectDestroyed {
        handle: u32,
        kind: NetObjectKind,
        owner_id: i32,
    },
    PlayerJoined {
        client_id: i32,
    },
    PlayerLeft {
        client_id: i32,
        banned: bool,
    },
    HostChanged {
        client_id: i32,
    },
    /// Raised once, when the roster empties.
    Destroyed,
}

#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<Outbound>,
    pub events: Vec<GameEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }

    /// Payloads sent to `client_id`, in order.
    pub fn payloads_for(&self, client_id: i32) -> impl Iterator<Item = &[u8]> {
        self.messages
            .iter()
            .filter(move |m| m.client_id == client_id)
            .map(|m| &m.payload[..])
    }
}

pub struct Game {
    code: GameCode,
    state: GameState,
    host_id: Option<i32>,
    is_public: bool,
    max_players: usize,
    /// Insertion order; host migration picks the first entry.
    players: Vec<ClientPlayer>,
    banned: HashSet<IpAddr>,
    objects: NetObjectRegistry,
    bootstrap: Bootstrap,
}

impl Game {
    pub fn new(code: GameCode, max_players: usize) -> Self {
        Self {
            code,
            state: GameState::NotStarted,
            host_id: None,
            is_public: false,
            max_players,
            players: Vec::new(),
            banned: HashSet::new(),
            objects: NetObjectRegistry::new(),
            bootstrap: Bootstrap::Idle,
        }
    }

    pub fn code(&self) -> GameCode {
        self.code
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn host_id(&self) -> Option<i32> {
        self.host_id
    }

    pub fn is_host(&self, client_id: i32) -> bool {
        self.host_id == Some(client_id)
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn players(&self) -> &[ClientPlayer] {
        &self.players
    }

    pub fn player(&self, client_id: i32) -> Option<&ClientPlayer> {
        self.players.iter().find(|p| p.client_id == client_id)
    }

    fn player_mut(&mut self, client_id: i32) -> Option<&mut ClientPlayer> {
        self.players.iter_mut().find(|p| p.client_id == client_id)
    }

    pub fn objects(&self) -> &NetObjectRegistry {
        &self.objects
    }

    pub fn is_banned(&self, ip: IpAddr) -> bool {
        self.banned.contains(&ip)
    }

    /// Routes one root message from a seated player.
    ///
    /// `message` must be positioned just past the game code. Only a rejected
    /// GameData payload is reported back; anything else malformed is logged
    /// and dropped.
    pub fn handle_message(
        &mut self,
        sender_id: i32,
        message: &mut MessageReader<'_>,
        out: &mut Outbox,
    ) -> Result<(), GameDataError> {
        let Some(flag) = MessageFlag::from_u8(message.tag()) else {
            trace!("{} - Ignoring root tag {}", self.code, message.tag());
            return Ok(());
        };

        if self.player(sender_id).is_none() {
            warn!(
                "{} - Client {} sent {:?} without being in the game",
                self.code, sender_id, flag
            );
            return Ok(());
        }

        match flag {
            MessageFlag::GameData | MessageFlag::GameDataTo => {
                let code = self.code;
                let body = message.remaining_bytes();
                let to_player = flag == MessageFlag::GameDataTo;

                match self.handle_game_data(sender_id, message, to_player, out)? {
                    Delivery::Broadcast => self.broadcast(
                        out,
                        |p| p.client_id != sender_id && p.limbo == LimboState::NotLimbo,
                        |w| messages::write_game_data(w, code, body),
                    ),
                    // The body still starts with the packed target.
                    Delivery::Player(target) => self.send_to(out, target, |w| {
                        w.start_message(MessageFlag::GameDataTo.as_u8());
                        w.write_i32(code.value());
                        w.write_bytes(body);
                        w.end_message()
                    }),
                    Delivery::Consumed => {}
                }
                Ok(())
            }
            _ => {
                if let Err(e) = self.handle_control(flag, sender_id, message, out) {
                    warn!(
                        "{} - Malformed {:?} from client {}: {}",
                        self.code, flag, sender_id, e
                    );
                }
                Ok(())
            }
        }
    }

    fn handle_control(
        &mut self,
        flag: MessageFlag,
        sender_id: i32,
        message: &mut MessageReader<'_>,
        out: &mut Outbox,
    ) -> Result<(), CodecError> {
        match flag {
            MessageFlag::StartGame => {
                self.start(sender_id, out);
            }
            MessageFlag::EndGame => {
                let reason = message.read_u8()?;
                let reason = GameOverReason::from_u8(reason).unwrap_or(GameOverReason::HumansByVote);
                self.end(sender_id, reason, out);
            }
            MessageFlag::AlterGame => {
                let tag = message.read_u8()?;
                if AlterGameTag::from_u8(tag) == Some(AlterGameTag::ChangePrivacy) {
                    let is_public = message.read_bool()?;
                    self.set_public(sender_id, is_public, out);
                } else {
                    trace!("{} - Ignoring AlterGame tag {}", self.code, tag);
                }
            }
            MessageFlag::KickPlayer => {
                let target = message.read_packed_i32()?;
                let is_ban = message.read_bool()?;
                self.kick(sender_id, target, is_ban, out);
            }
            MessageFlag::RemovePlayer => {
                self.remove_player(sender_id, LeaveReason::Disconnect, out);
            }
            _ => trace!("{} - Ignoring {:?} from client {}", self.code, flag, sender_id),
        }
        Ok(())
    }

    /// DataFlag sub-messages for every object that reports state to send.
    ///
    /// Objects whose kind cannot encode yet are skipped.
    pub fn encode_data_batch(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = MessageWriter::new();
        let mut body = MessageWriter::new();

        for object in self.objects.iter() {
            body.clear();
            match object.encode_delta(&mut body, false) {
                Ok(true) => messages::game_data::write_data(&mut writer, object.handle, body.as_bytes())?,
                Ok(false) => {}
                Err(e) => trace!("{} - Skipping {} in batch: {}", self.code, object.handle, e),
            }
        }

        Ok(writer.into_bytes())
    }

    fn send_to<F>(&self, out: &mut Outbox, client_id: i32, build: F)
    where
        F: FnOnce(&mut MessageWriter) -> Result<(), CodecError>,
    {
        let Some(player) = self.player(client_id) else {
            return;
        };
        if let Some(payload) = self.encode(build) {
            out.messages.push(Outbound {
                client_id,
                addr: player.addr,
                payload,
            });
        }
    }

    fn broadcast<P, F>(&self, out: &mut Outbox, recipients: P, build: F)
    where
        P: Fn(&ClientPlayer) -> bool,
        F: FnOnce(&mut MessageWriter) -> Result<(), CodecError>,
    {
        let mut targets = self.players.iter().filter(|&p| recipients(p)).peekable();
        if targets.peek().is_none() {
            return;
        }
        let Some(payload) = self.encode(build) else {
            return;
        };
        for player in targets {
            out.messages.push(Outbound {
                client_id: player.client_id,
                addr: player.addr,
                payload: Arc::clone(&payload),
            });
        }
    }

    fn encode<F>(&self, build: F) -> Option<Arc<[u8]>>
    where
        F: FnOnce(&mut MessageWriter) -> Result<(), CodecError>,
    {
        let mut writer = MessageWriter::new();
        match build(&mut writer) {
            Ok(()) => Some(writer.into_bytes().into()),
            Err(e) => {
                error!("{} - Failed to encode outbound message: {}", self.code, e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use shared::messages::ServerMessage;

    pub const CODE: GameCode = GameCode(0x4142_4344);

    pub fn addr(client_id: i32) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, client_id as u8], 20_000 + client_id as u16))
    }

    /// A game with the given clients joined in order; the first is host.
    pub fn game_with(ids: &[i32]) -> Game {
        let mut game = Game::new(CODE, 10);
        let mut out = Outbox::new();
        for &id in ids {
            game.add_player(id, format!("player{}", id), addr(id), &mut out)
                .unwrap();
        }
        game
    }

    pub fn decoded_for(out: &Outbox, client_id: i32) -> Vec<ServerMessage> {
        out.payloads_for(client_id)
            .flat_map(|payload| ServerMessage::decode_all(payload).unwrap())
            .collect()
    }

    /// Frames a root message from raw body bytes and hands it to the game.
    pub fn send_root(
        game: &mut Game,
        sender_id: i32,
        flag: MessageFlag,
        body: &[u8],
        out: &mut Outbox,
    ) -> Result<(), GameDataError> {
        let mut writer = MessageWriter::new();
        writer.start_message(flag.as_u8());
        writer.write_i32(game.code().value());
        writer.write_bytes(body);
        writer.end_message().unwrap();

        let bytes = writer.into_bytes();
        let mut reader = MessageReader::new(&bytes);
        let mut message = reader.read_message().unwrap();
        message.read_i32().unwrap();
        game.handle_message(sender_id, &mut message, out)
    }
}
