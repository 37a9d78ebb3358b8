//! Server network layer handling UDP communications and routing into games

use crate::client_manager::{Client, ClientManager};
use crate::config::ServerConfig;
use crate::game::{GameDataError, GameEvent, Outbox};
use crate::game_manager::{GameManager, GameObserver};
use bincode::{deserialize, serialize};
use log::{debug, error, info, trace, warn};
use shared::codec::{CodecError, MessageReader, MessageWriter};
use shared::messages;
use shared::protocol::{DisconnectReason, MessageFlag};
use shared::{GameCode, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client: Client },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages queued for the sender task
#[derive(Debug)]
pub enum OutgoingMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    /// Root messages wrapped into `Packet::Reliable` on the way out.
    SendReliable { payload: Arc<[u8]>, addr: SocketAddr },
}

/// Main server: owns the socket, the connection directory and the games
pub struct Server {
    socket: Arc<UdpSocket>,
    config: ServerConfig,
    clients: Arc<RwLock<ClientManager>>,
    games: Arc<GameManager>,

    // Communication channels
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    send_tx: mpsc::UnboundedSender<OutgoingMessage>,
    send_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl Server {
    pub async fn new(
        config: ServerConfig,
        observer: Arc<dyn GameObserver>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (send_tx, send_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            games: Arc::new(GameManager::new(config.max_players, observer)),
            config,
            event_tx,
            event_rx,
            send_tx,
            send_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_manager(&self) -> Arc<GameManager> {
        Arc::clone(&self.games)
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) = event_tx.send(NetworkEvent::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(_) => warn!("Failed to deserialize packet from {}", addr),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    ///
    /// Every datagram is sent on its own; a failed send is logged and the
    /// queue moves on.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut send_rx = std::mem::replace(&mut self.send_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = send_rx.recv().await {
                let (packet, addr) = match message {
                    OutgoingMessage::SendPacket { packet, addr } => (packet, addr),
                    OutgoingMessage::SendReliable { payload, addr } => (
                        Packet::Reliable {
                            payload: payload.to_vec(),
                        },
                        addr,
                    ),
                };

                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();
        let period = (self.config.client_timeout / 4).clamp(
            Duration::from_millis(50),
            Duration::from_secs(1),
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    info!("Client {} timed out", client.id);
                    if let Err(e) = event_tx.send(NetworkEvent::ClientTimeout { client }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        if data.len() > MAX_DATAGRAM_SIZE {
            warn!("Datagram of {} bytes to {} exceeds {}", data.len(), addr, MAX_DATAGRAM_SIZE);
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.send_tx.send(OutgoingMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_reliable(&self, payload: Arc<[u8]>, addr: SocketAddr) {
        if let Err(e) = self.send_tx.send(OutgoingMessage::SendReliable { payload, addr }) {
            error!("Failed to queue reliable payload: {}", e);
        }
    }

    /// Builds one root message and queues it for `addr`.
    fn reply<F>(&self, addr: SocketAddr, build: F)
    where
        F: FnOnce(&mut MessageWriter) -> Result<(), CodecError>,
    {
        let mut writer = MessageWriter::new();
        match build(&mut writer) {
            Ok(()) => self.send_reliable(writer.into_bytes().into(), addr),
            Err(e) => error!("Failed to encode reply to {}: {}", addr, e),
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(client_id) = client_id {
                clients.touch(client_id);
            }
            client_id
        };

        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Client {} connecting from {} (version: {})",
                    name, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: format!("{:?}", DisconnectReason::IncorrectVersion),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, name)
                };

                let response = match client_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(response, addr);
            }

            Packet::Reliable { payload } => match client_id {
                Some(client_id) => self.handle_reliable(client_id, addr, &payload).await,
                None => warn!("Reliable payload from unconnected address {}", addr),
            },

            Packet::Disconnect => {
                if let Some(client_id) = client_id {
                    self.drop_client(client_id).await;
                }
            }

            Packet::Connected { .. } | Packet::Disconnected { .. } => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Walks the root messages of one payload.
    async fn handle_reliable(&mut self, client_id: i32, addr: SocketAddr, payload: &[u8]) {
        let mut reader = MessageReader::new(payload);

        while reader.has_remaining() {
            let mut message = match reader.read_message() {
                Ok(message) => message,
                Err(e) => {
                    warn!("Malformed root message from client {}: {}", client_id, e);
                    return;
                }
            };

            if let Err(e) = self.handle_root_message(client_id, addr, &mut message).await {
                match e {
                    RootError::Codec(e) => {
                        warn!("Malformed root message from client {}: {}", client_id, e)
                    }
                    RootError::Disconnected => return,
                }
            }
        }
    }

    async fn handle_root_message(
        &mut self,
        client_id: i32,
        addr: SocketAddr,
        message: &mut MessageReader<'_>,
    ) -> Result<(), RootError> {
        let Some(flag) = MessageFlag::from_u8(message.tag()) else {
            trace!("Ignoring root tag {} from client {}", message.tag(), client_id);
            return Ok(());
        };

        match flag {
            MessageFlag::HostGame => {
                // One unjoined game per client at a time.
                let previous = self.clients.write().await.take_hosted(client_id);
                self.close_empty_games(&previous).await;

                let code = self.games.create().await;
                self.clients.write().await.add_hosted(client_id, code);
                debug!("Client {} created game {}", client_id, code);
                self.reply(addr, |w| messages::write_host_game(w, code));
                Ok(())
            }
            MessageFlag::JoinGame => {
                let code = GameCode(message.read_i32()?);
                self.join_game(client_id, addr, code).await;
                Ok(())
            }
            _ => {
                let code = GameCode(message.read_i32()?);
                self.route_to_game(client_id, code, message).await
            }
        }
    }

    async fn join_game(&mut self, client_id: i32, addr: SocketAddr, code: GameCode) {
        let (name, current) = {
            let clients = self.clients.read().await;
            match clients.get(client_id) {
                Some(client) => (client.name.clone(), client.game),
                None => return,
            }
        };

        if let Some(previous) = current.filter(|&previous| previous != code) {
            self.leave_game(client_id, previous).await;
        }

        let Some(game) = self.games.find(code).await else {
            debug!("Client {} asked for unknown game {}", client_id, code);
            self.reply(addr, |w| {
                messages::write_join_game_error(w, DisconnectReason::GameNotFound)
            });
            return;
        };

        let mut out = Outbox::new();
        let result = {
            let mut game = game.lock().await;
            game.add_player(client_id, name, addr, &mut out)
        };

        match result {
            Ok(()) => {
                self.clients.write().await.set_game(client_id, Some(code));
            }
            Err(e) => {
                info!("{} - Refused client {}: {}", code, client_id, e);
                self.reply(addr, |w| messages::write_join_game_error(w, e.disconnect_reason()));
            }
        }

        self.flush(code, out).await;
    }

    async fn route_to_game(
        &mut self,
        client_id: i32,
        code: GameCode,
        message: &mut MessageReader<'_>,
    ) -> Result<(), RootError> {
        let Some(game) = self.games.find(code).await else {
            debug!("Client {} addressed unknown game {}", client_id, code);
            return Ok(());
        };

        let mut out = Outbox::new();
        let result = {
            let mut game = game.lock().await;
            game.handle_message(client_id, message, &mut out)
        };
        self.flush(code, out).await;

        match result {
            Ok(()) => Ok(()),
            Err(GameDataError::UnknownTarget(target)) => {
                debug!("{} - Client {} addressed absent player {}", code, client_id, target);
                Ok(())
            }
            Err(e @ GameDataError::ProtocolViolation { .. }) => {
                warn!("{} - Disconnecting client {}: {}", code, client_id, e);
                self.kick_client(client_id, DisconnectReason::Hacking).await;
                Err(RootError::Disconnected)
            }
        }
    }

    /// Removes a client from its game, if it sits in one.
    async fn leave_game(&mut self, client_id: i32, code: GameCode) {
        let Some(game) = self.games.find(code).await else {
            return;
        };

        let mut out = Outbox::new();
        {
            let mut game = game.lock().await;
            game.remove_player(client_id, crate::game::LeaveReason::Disconnect, &mut out);
        }
        self.flush(code, out).await;
    }

    /// Destroys the listed games that nobody has joined.
    async fn close_empty_games(&mut self, codes: &[GameCode]) {
        for &code in codes {
            let Some(game) = self.games.find(code).await else {
                continue;
            };

            let mut out = Outbox::new();
            let closed = game.lock().await.close_if_empty(&mut out);
            if closed {
                self.flush(code, out).await;
            }
        }
    }

    /// Cleans up after a client that is gone from the directory.
    async fn release_client(&mut self, client: Client) {
        if let Some(code) = client.game {
            self.leave_game(client.id, code).await;
        }
        self.close_empty_games(&client.hosted).await;
    }

    async fn drop_client(&mut self, client_id: i32) {
        let removed = self.clients.write().await.remove_client(client_id);
        if let Some(client) = removed {
            self.release_client(client).await;
        }
    }

    async fn kick_client(&mut self, client_id: i32, reason: DisconnectReason) {
        let addr = self.clients.read().await.get_addr(client_id);
        if let Some(addr) = addr {
            self.send_packet(
                Packet::Disconnected {
                    reason: format!("{:?}", reason),
                },
                addr,
            );
        }
        self.drop_client(client_id).await;
    }

    /// Sends what a game operation produced and applies its events.
    ///
    /// Runs after the game lock is released.
    async fn flush(&mut self, code: GameCode, out: Outbox) {
        for outbound in out.messages {
            self.send_reliable(outbound.payload, outbound.addr);
        }

        {
            let mut clients = self.clients.write().await;
            for event in &out.events {
                if let GameEvent::PlayerLeft { client_id, .. } = *event {
                    let seated_here = clients
                        .get(client_id)
                        .is_some_and(|client| client.game == Some(code));
                    if seated_here {
                        clients.set_game(client_id, None);
                    }
                }
            }
        }

        self.games.process_events(code, &out.events).await;
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut stats_interval = tokio::time::interval(Duration::from_secs(30));

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(NetworkEvent::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(NetworkEvent::ClientTimeout { client }) => {
                            self.release_client(client).await;
                        }
                        Some(NetworkEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = stats_interval.tick() => {
                    let client_count = self.clients.read().await.len();
                    if client_count > 0 {
                        debug!("{} clients in {} games", client_count, self.games.len().await);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Why processing of a reliable payload stopped early
#[derive(Debug)]
enum RootError {
    Codec(CodecError),
    /// The sender was dropped mid-payload.
    Disconnected,
}

impl From<CodecError> for RootError {
    fn from(e: CodecError) -> Self {
        RootError::Codec(e)
    }
}
