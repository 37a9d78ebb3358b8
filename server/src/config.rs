use std::time::Duration;

/// Runtime settings for [`crate::network::Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Seats per game.
    pub max_players: usize,
    /// Silence after which a client is dropped.
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:22023".to_string(),
            max_clients: 256,
            max_players: 10,
            client_timeout: Duration::from_secs(5),
        }
    }
}
