//! Relay network layer: UDP datagrams in, presence events fanned out

use crate::client_manager::ClientManager;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, ParticipantId, Position, CLIENT_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

const MAX_DATAGRAM: usize = 65_536;

/// Messages sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ParticipantId,
    },
}

/// Messages sent from the relay loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ParticipantId>,
    },
}

/// Relay server. Holds no game state beyond each participant's last
/// reported position.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    client_timeout: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            client_timeout,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        // Connection-refused errors from departed clients land here on some
                        // platforms; they are not fatal for the relay.
                        debug!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut outbound_rx =
            std::mem::replace(&mut self.outbound_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(&client_id) == exclude.as_ref() {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to participant {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors participant timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;
        let check_every = (timeout / 4).max(Duration::from_millis(10));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_every);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
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
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ParticipantId>) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn announce_departure(&self, client_id: ParticipantId) {
        self.broadcast_packet(Packet::PlayerDisconnected { id: client_id }, None);
    }

    /// Handles one inbound packet and queues the resulting fan-out
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let sender = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Participant connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != CLIENT_VERSION {
                    self.send_packet(
                        Packet::Rejected {
                            reason: format!(
                                "Unsupported client version {} (relay speaks {})",
                                client_version, CLIENT_VERSION
                            ),
                        },
                        addr,
                    );
                    return;
                }

                // A second hello from the same address replaces the old participant
                if let Some(existing_id) = sender {
                    info!("Replacing participant {} from {}", existing_id, addr);
                    let removed = {
                        let mut clients = self.clients.write().await;
                        clients.remove_client(&existing_id)
                    };
                    if removed.is_some() {
                        self.announce_departure(existing_id);
                    }
                }

                let (joined, snapshot) = {
                    let mut clients = self.clients.write().await;
                    let joined = clients.add_client(addr);
                    (joined, clients.positions())
                };

                match joined {
                    Some((id, position)) => {
                        self.send_packet(Packet::Connected { id: id.clone() }, addr);
                        self.send_packet(Packet::CurrentPlayers { players: snapshot }, addr);
                        self.broadcast_packet(
                            Packet::NewPlayer {
                                id: id.clone(),
                                x: position.x,
                                y: position.y,
                            },
                            Some(id),
                        );
                    }
                    None => {
                        self.send_packet(
                            Packet::Rejected {
                                reason: "Relay full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::PlayerMove { x, y } => {
                let Some(client_id) = sender else {
                    debug!("Move from unknown address {} ignored", addr);
                    return;
                };

                let position = Position::new(x, y);
                if !position.is_finite() {
                    warn!("Non-finite move from {} dropped", client_id);
                    return;
                }

                let updated = {
                    let mut clients = self.clients.write().await;
                    clients.update_position(&client_id, position)
                };

                if updated {
                    self.broadcast_packet(
                        Packet::UpdatePlayer {
                            id: client_id.clone(),
                            pos: position,
                        },
                        Some(client_id),
                    );
                }
            }

            Packet::Heartbeat => {
                let Some(client_id) = sender else {
                    return;
                };

                let alive = {
                    let mut clients = self.clients.write().await;
                    clients.touch(&client_id)
                };
                if alive {
                    self.send_packet(Packet::Heartbeat, addr);
                }
            }

            Packet::Disconnect => {
                let Some(client_id) = sender else {
                    return;
                };

                let removed = {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id)
                };
                if removed.is_some() {
                    self.announce_departure(client_id);
                }
            }

            other => {
                warn!(
                    "Unexpected {} packet from client at {}",
                    other.name(),
                    addr
                );
            }
        }
    }

    /// Main relay loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Relay started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id }) => {
                    self.announce_departure(client_id);
                }
                None => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
