//! UDP link to the relay, driven by a background tokio runtime
//!
//! The frame loop must never wait on the network, so socket I/O lives on a
//! dedicated thread running a current-thread tokio runtime. The two sides talk
//! over unbounded mpsc channels: encoded datagrams go out, decoded packets and
//! loss notifications come back and are drained by `try_recv` once per frame.
//!
//! The link also keeps the relay's liveness check happy by sending a
//! `Heartbeat` every `heartbeat_interval`, and reports itself lost when the
//! relay has been silent for longer than `timeout`. Heartbeat replies do not
//! count as an answer to the hello: if no other packet arrives within
//! `timeout` of opening, the link is reported lost as well.

use crate::transport::{Link, LinkEvent, TransportError};
use log::{debug, error, warn};
use shared::Packet;
use std::thread;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
pub const LINK_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_DATAGRAM: usize = 65_536;

struct Connection {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

pub struct UdpLink {
    connection: Option<Connection>,
    heartbeat_interval: Duration,
    timeout: Duration,
}

impl UdpLink {
    pub fn new() -> Self {
        Self::with_timing(HEARTBEAT_INTERVAL, LINK_TIMEOUT)
    }

    pub fn with_timing(heartbeat_interval: Duration, timeout: Duration) -> Self {
        Self {
            connection: None,
            heartbeat_interval,
            timeout,
        }
    }
}

impl Default for UdpLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Link for UdpLink {
    fn open(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        }

        self.close();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let endpoint = endpoint.to_string();
        let heartbeat_interval = self.heartbeat_interval;
        let timeout = self.timeout;

        thread::Builder::new()
            .name("relay-link".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start link runtime: {}", e);
                        let _ = inbound_tx.send(LinkEvent::Lost {
                            reason: format!("runtime failed: {}", e),
                        });
                        return;
                    }
                };

                runtime.block_on(run_link(
                    endpoint,
                    outbound_rx,
                    inbound_tx,
                    heartbeat_interval,
                    timeout,
                ));
            })?;

        self.connection = Some(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        });
        Ok(())
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotOpen)?;

        let data = packet.encode().map_err(|source| TransportError::Encode {
            event: packet.name(),
            source,
        })?;

        connection
            .outbound
            .send(data)
            .map_err(|_| TransportError::NotOpen)
    }

    fn try_recv(&mut self) -> Option<LinkEvent> {
        self.connection.as_mut()?.inbound.try_recv().ok()
    }

    fn close(&mut self) {
        // Dropping the sender ends the link task once queued datagrams
        // have been flushed.
        if self.connection.take().is_some() {
            debug!("Relay link closed");
        }
    }
}

async fn connect_socket(endpoint: &str) -> Result<UdpSocket, TransportError> {
    let addr = lookup_host(endpoint)
        .await
        .map_err(|_| TransportError::InvalidEndpoint(endpoint.to_string()))?
        .next()
        .ok_or_else(|| TransportError::InvalidEndpoint(endpoint.to_string()))?;

    let bind_addr = if addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

async fn run_link(
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
    heartbeat_interval: Duration,
    timeout: Duration,
) {
    let socket = match connect_socket(&endpoint).await {
        Ok(socket) => socket,
        Err(e) => {
            let _ = inbound.send(LinkEvent::Lost {
                reason: e.to_string(),
            });
            return;
        }
    };
    debug!("Relay link bound, talking to {}", endpoint);

    let heartbeat = match Packet::Heartbeat.encode() {
        Ok(data) => data,
        Err(e) => {
            let _ = inbound.send(LinkEvent::Lost {
                reason: format!("heartbeat encoding failed: {}", e),
            });
            return;
        }
    };

    let mut heartbeat_timer = interval(heartbeat_interval);
    heartbeat_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let opened_at = Instant::now();
    let mut last_heard = opened_at;
    let mut answered = false;
    let mut buffer = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            result = socket.recv(&mut buffer) => {
                match result {
                    Ok(len) => {
                        last_heard = Instant::now();
                        match Packet::decode(&buffer[..len]) {
                            Ok(Packet::Heartbeat) => {}
                            Ok(packet) => {
                                answered = true;
                                if inbound.send(LinkEvent::Packet(packet)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to decode datagram from relay: {}", e),
                        }
                    }
                    Err(e) => {
                        let _ = inbound.send(LinkEvent::Lost {
                            reason: format!("receive failed: {}", e),
                        });
                        break;
                    }
                }
            },

            message = outbound.recv() => {
                match message {
                    Some(data) => {
                        if let Err(e) = socket.send(&data).await {
                            warn!("Failed to send datagram to relay: {}", e);
                        }
                    }
                    None => break,
                }
            },

            _ = heartbeat_timer.tick() => {
                if last_heard.elapsed() > timeout {
                    let _ = inbound.send(LinkEvent::Lost {
                        reason: format!("relay silent for {:?}", timeout),
                    });
                    break;
                }
                if !answered && opened_at.elapsed() > timeout {
                    let _ = inbound.send(LinkEvent::Lost {
                        reason: format!("no reply to hello within {:?}", timeout),
                    });
                    break;
                }
                if let Err(e) = socket.send(&heartbeat).await {
                    warn!("Failed to send heartbeat: {}", e);
                }
            },
        }
    }

    debug!("Relay link task for {} finished", endpoint);
}
