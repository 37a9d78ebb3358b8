//! Connection directory for the server
//!
//! Tracks every client that completed the session handshake: its id, the
//! address replies go to, the name it announced and which game (if any) it
//! currently sits in. Liveness is measured from the last datagram received.

use log::info;
use shared::protocol::PLACEHOLDER_CLIENT_ID;
use shared::GameCode;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: i32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    pub name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Game the client is seated in
    pub game: Option<GameCode>,
    /// Games this client created that may still be waiting for players
    pub hosted: Vec<GameCode>,
}

impl Client {
    pub fn new(id: i32, addr: SocketAddr, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            last_seen: Instant::now(),
            game: None,
            hosted: Vec::new(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the connection limit and hands out ids. Ids start at 1, only
/// grow, and never collide with the reserved placeholder id.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<i32, Client>,
    /// Next available client ID for new connections
    next_client_id: i32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the server is at capacity or ids are exhausted.
    pub fn add_client(&mut self, addr: SocketAddr, name: String) -> Option<i32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }
        if self.next_client_id >= PLACEHOLDER_CLIENT_ID {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, name, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, name));

        Some(client_id)
    }

    /// Removes a client, returning it if it was connected.
    pub fn remove_client(&mut self, client_id: i32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<i32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: i32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Refreshes the liveness timestamp.
    pub fn touch(&mut self, client_id: i32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    pub fn set_game(&mut self, client_id: i32, game: Option<GameCode>) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.game = game;
                true
            }
            None => false,
        }
    }

    /// Records a game created on behalf of this client.
    pub fn add_hosted(&mut self, client_id: i32, code: GameCode) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.hosted.push(code);
                true
            }
            None => false,
        }
    }

    /// Hands back the games this client created and forgets them.
    pub fn take_hosted(&mut self, client_id: i32) -> Vec<GameCode> {
        self.clients
            .get_mut(&client_id)
            .map(|client| std::mem::take(&mut client.hosted))
            .unwrap_or_default()
    }

    pub fn get_addr(&self, client_id: i32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed clients so their games can be notified.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timed_out: Vec<i32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, "red".to_string());

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.name, "red");
        assert!(client.game.is_none());
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), "red".to_string());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        let client_id1 = manager.add_client(test_addr(), "a".to_string()).unwrap();
        let client_id2 = manager.add_client(test_addr2(), "b".to_string()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr(), "a".to_string()).is_some());
        assert!(manager.add_client(test_addr2(), "b".to_string()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_stop_before_placeholder() {
        let mut manager = manager(4);
        manager.next_client_id = PLACEHOLDER_CLIENT_ID - 1;

        assert_eq!(
            manager.add_client(test_addr(), "a".to_string()),
            Some(PLACEHOLDER_CLIENT_ID - 1)
        );
        assert_eq!(manager.add_client(test_addr2(), "b".to_string()), None);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr(), "a".to_string()).unwrap();

        let removed = manager.remove_client(client_id).unwrap();
        assert_eq!(removed.id, client_id);
        assert!(manager.is_empty());
        assert!(manager.remove_client(client_id).is_none());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let client_id1 = manager.add_client(test_addr(), "a".to_string()).unwrap();
        manager.add_client(test_addr2(), "b".to_string()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_set_game() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr(), "a".to_string()).unwrap();

        assert!(manager.set_game(client_id, Some(GameCode(-7))));
        assert_eq!(manager.get(client_id).unwrap().game, Some(GameCode(-7)));
        assert!(!manager.set_game(99, None));
        assert_eq!(manager.get_addr(client_id), Some(test_addr()));
    }

    #[test]
    fn test_hosted_games() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr(), "a".to_string()).unwrap();

        assert!(manager.add_hosted(client_id, GameCode(-7)));
        assert!(manager.add_hosted(client_id, GameCode(-8)));
        assert!(!manager.add_hosted(99, GameCode(-9)));

        assert_eq!(manager.take_hosted(client_id), vec![GameCode(-7), GameCode(-8)]);
        assert!(manager.take_hosted(client_id).is_empty());
        assert!(manager.take_hosted(99).is_empty());

        manager.add_hosted(client_id, GameCode(-10));
        let removed = manager.remove_client(client_id).unwrap();
        assert_eq!(removed.hosted, vec![GameCode(-10)]);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(4, Duration::from_millis(10));
        let stale = manager.add_client(test_addr(), "a".to_string()).unwrap();
        let fresh = manager.add_client(test_addr2(), "b".to_string()).unwrap();

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(1);
        manager.touch(fresh);

        let removed = manager.check_timeouts();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, stale);
        assert_eq!(manager.len(), 1);
    }
}
