//! Directory of running games
//!
//! Each game sits behind its own mutex; the directory lock is only held to
//! look up, insert or drop an entry, so work on one game never waits on
//! another.

use crate::game::{Game, GameEvent};
use crate::net_objects::NetObjectKind;
use log::{debug, info};
use shared::GameCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Hooks fired as games change; all default to doing nothing.
pub trait GameObserver: Send + Sync {
    fn object_spawned(&self, _code: GameCode, _handle: u32, _kind: NetObjectKind, _owner_id: i32) {}

    fn object_destroyed(&self, _code: GameCode, _handle: u32, _kind: NetObjectKind, _owner_id: i32) {
    }

    fn game_removed(&self, _code: GameCode) {}
}

/// Observer that only logs
pub struct LoggingObserver;

impl GameObserver for LoggingObserver {
    fn object_spawned(&self, code: GameCode, handle: u32, kind: NetObjectKind, owner_id: i32) {
        debug!("{} - Spawned {:?} {} for {}", code, kind, handle, owner_id);
    }

    fn object_destroyed(&self, code: GameCode, handle: u32, kind: NetObjectKind, owner_id: i32) {
        debug!("{} - Despawned {:?} {} of {}", code, kind, handle, owner_id);
    }

    fn game_removed(&self, code: GameCode) {
        info!("{} - Removed from directory", code);
    }
}

pub struct GameManager {
    games: RwLock<HashMap<GameCode, Arc<Mutex<Game>>>>,
    max_players: usize,
    observer: Arc<dyn GameObserver>,
}

impl GameManager {
    pub fn new(max_players: usize, observer: Arc<dyn GameObserver>) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            max_players,
            observer,
        }
    }

    /// Creates an empty game under a fresh random code.
    pub async fn create(&self) -> GameCode {
        let mut games = self.games.write().await;
        let mut rng = rand::thread_rng();

        let code = loop {
            let code = GameCode::random_v2(&mut rng);
            if !games.contains_key(&code) {
                break code;
            }
        };

        games.insert(code, Arc::new(Mutex::new(Game::new(code, self.max_players))));
        info!("{} - Game created", code);
        code
    }

    pub async fn find(&self, code: GameCode) -> Option<Arc<Mutex<Game>>> {
        self.games.read().await.get(&code).cloned()
    }

    /// Drops a game; returns `false` if it was already gone.
    pub async fn remove(&self, code: GameCode) -> bool {
        self.games.write().await.remove(&code).is_some()
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    /// Forwards a game's events to the observer and drops destroyed games.
    pub async fn process_events(&self, code: GameCode, events: &[GameEvent]) {
        for event in events {
            match *event {
                GameEvent::ObjectSpawned {
                    handle,
                    kind,
                    owner_id,
                } => self.observer.object_spawned(code, handle, kind, owner_id),
                GameEvent::ObjectDestroyed {
                    handle,
                    kind,
                    owner_id,
                } => self.observer.object_destroyed(code, handle, kind, owner_id),
                GameEvent::Destroyed => {
                    if self.remove(code).await {
                        self.observer.game_removed(code);
                    }
                }
                GameEvent::PlayerJoined { .. }
                | GameEvent::PlayerLeft { .. }
                | GameEvent::HostChanged { .. } => {}
            }
        }
    }
}
