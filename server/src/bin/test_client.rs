use bincode::{deserialize, serialize};
use shared::codec::MessageWriter;
use shared::messages::{self, game_data, ServerMessage};
use shared::protocol::{SpawnFlags, GLOBAL_OWNER_ID, PLACEHOLDER_CLIENT_ID};
use shared::{GameCode, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const GAME_DATA_PREFAB_ID: u32 = 3;
const GAME_DATA_HANDLE: u32 = 1;

async fn send(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server_addr).await?;
    Ok(())
}

async fn send_root<F>(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    build: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut MessageWriter) -> Result<(), shared::CodecError>,
{
    let mut writer = MessageWriter::new();
    build(&mut writer)?;
    let payload = writer.into_bytes();
    send(socket, server_addr, &Packet::Reliable { payload }).await
}

async fn recv(socket: &UdpSocket) -> Result<Packet, Box<dyn std::error::Error>> {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf)).await??;
    Ok(deserialize::<Packet>(&buf[..len])?)
}

/// Prints root messages until one satisfies `done`.
async fn wait_for<F>(socket: &UdpSocket, mut done: F) -> Result<ServerMessage, Box<dyn std::error::Error>>
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        match recv(socket).await? {
            Packet::Reliable { payload } => {
                for message in ServerMessage::decode_all(&payload)? {
                    println!("<- {:?}", message);
                    if done(&message) {
                        return Ok(message);
                    }
                }
            }
            Packet::Disconnected { reason } => return Err(format!("disconnected: {}", reason).into()),
            other => println!("<- {:?}", other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:22023".to_string())
        .parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    println!("Sending connection request to {}", server_addr);
    send(
        &socket,
        server_addr,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: "test_client".to_string(),
        },
    )
    .await?;

    let client_id = match recv(&socket).await? {
        Packet::Connected { client_id } => client_id,
        other => return Err(format!("connection refused: {:?}", other).into()),
    };
    println!("Connection accepted with client ID: {}", client_id);

    send_root(&socket, server_addr, |w| messages::write_host_game_request(w, &[])).await?;
    let code = match wait_for(&socket, |m| matches!(m, ServerMessage::HostGame { .. })).await? {
        ServerMessage::HostGame { code } => code,
        _ => GameCode(0),
    };
    println!("Hosting game {}", code);

    send_root(&socket, server_addr, |w| messages::write_join_game_request(w, code)).await?;
    wait_for(&socket, |m| {
        matches!(m, ServerMessage::JoinGame { client_id, .. } if *client_id == PLACEHOLDER_CLIENT_ID)
    })
    .await?;

    // Answer the bootstrap with the lobby's GameData object.
    let mut spawn = MessageWriter::new();
    game_data::write_spawn(
        &mut spawn,
        GAME_DATA_PREFAB_ID,
        GLOBAL_OWNER_ID,
        SpawnFlags::NONE,
        &[(GAME_DATA_HANDLE, &[0])],
    )?;
    send_root(&socket, server_addr, |w| {
        messages::write_game_data_to(w, code, PLACEHOLDER_CLIENT_ID, spawn.as_bytes())
    })
    .await?;

    wait_for(&socket, |m| {
        matches!(m, ServerMessage::RemovePlayer { client_id, .. } if *client_id == PLACEHOLDER_CLIENT_ID)
    })
    .await?;
    println!("Bootstrap complete");

    send(&socket, server_addr, &Packet::Disconnect).await?;
    println!("Disconnected");

    Ok(())
}
