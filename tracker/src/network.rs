//! Relay transport and the event loop driving the session

use crate::effects::{Effect, Timer};
use crate::session::Session;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Outbound, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Applies packets and fired timers to the session, one at a time
///
/// Timers run as detached sleeps that report back through a channel, so the
/// session is only ever touched from this loop. Returns the session once
/// the inbound channel closes.
pub async fn run_event_loop(
    mut session: Session,
    mut inbound_rx: mpsc::UnboundedReceiver<Packet>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
) -> Session {
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<Timer>();

    loop {
        tokio::select! {
            packet = inbound_rx.recv() => {
                match packet {
                    Some(packet) => {
                        let effects = session.handle_packet(packet);
                        dispatch(effects, &outbound_tx, &timer_tx);
                    }
                    None => {
                        info!("Packet stream closed");
                        break;
                    }
                }
            },

            Some(timer) = timer_rx.recv() => {
                let effects = session.handle_timer(timer);
                dispatch(effects, &outbound_tx, &timer_tx);
            },
        }
    }

    session
}

fn dispatch(
    effects: Vec<Effect>,
    outbound_tx: &mpsc::UnboundedSender<Outbound>,
    timer_tx: &mpsc::UnboundedSender<Timer>,
) {
    for effect in effects {
        match effect {
            Effect::Send(outbound) => {
                if let Err(e) = outbound_tx.send(outbound) {
                    error!("Failed to queue outbound message: {}", e);
                }
            }
            Effect::Schedule { delay, timer } => spawn_timer(delay, timer, timer_tx.clone()),
        }
    }
}

fn spawn_timer(delay: Duration, timer: Timer, timer_tx: mpsc::UnboundedSender<Timer>) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = timer_tx.send(timer) {
            debug!("Event loop gone, dropping {:?}", e.0);
        }
    });
}

/// UDP endpoint exchanging bincode frames with the protocol relay
///
/// The relay decodes the simulator's packets and forwards them here;
/// outbound effects go back to whichever address last sent a packet.
pub struct Server {
    socket: Arc<UdpSocket>,
    session: Session,
    relay_addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl Server {
    pub async fn new(addr: &str, session: Session) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Tracker listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            session,
            relay_addr: Arc::new(RwLock::new(None)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for relay packets
    fn spawn_network_receiver(&self, inbound_tx: mpsc::UnboundedSender<Packet>) {
        let socket = Arc::clone(&self.socket);
        let relay_addr = Arc::clone(&self.relay_addr);

        tokio::spawn(async move {
            let mut buffer = vec![0u8; 65536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let packet = match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => packet,
                            Err(e) => {
                                warn!("Failed to deserialize packet from {}: {}", addr, e);
                                continue;
                            }
                        };

                        {
                            let mut relay = relay_addr.write().await;
                            if *relay != Some(addr) {
                                info!("Relay connected from {}", addr);
                                *relay = Some(addr);
                            }
                        }

                        if let Err(e) = inbound_tx.send(packet) {
                            error!("Failed to send packet to event loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that forwards outbound effects to the relay
    fn spawn_network_sender(&self, mut outbound_rx: mpsc::UnboundedReceiver<Outbound>) {
        let socket = Arc::clone(&self.socket);
        let relay_addr = Arc::clone(&self.relay_addr);

        tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                let Some(addr) = *relay_addr.read().await else {
                    warn!("No relay connected, dropping {:?}", outbound);
                    continue;
                };

                if let Err(e) = Self::send_impl(&socket, &outbound, addr).await {
                    error!("Failed to send to relay {}: {}", addr, e);
                }
            }
        });
    }

    async fn send_impl(
        socket: &UdpSocket,
        outbound: &Outbound,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(outbound)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        self.spawn_network_receiver(inbound_tx);
        self.spawn_network_sender(outbound_rx);

        info!("Tracker started successfully");
        run_event_loop(self.session, inbound_rx, outbound_tx).await;
        info!("Tracker shutting down");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{connection_joined, pit_entry, pit_exit, player_joined, session};
    use shared::{CrossingAction, ZoneKind};
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    fn pit_start(player_id: u8) -> Packet {
        Packet::ZoneCrossing {
            player_id,
            action: CrossingAction::CircleEnter,
            zone: ZoneKind::Circle,
            flags: 0,
            heading: 1,
        }
    }

    fn start() -> (
        mpsc::UnboundedSender<Packet>,
        mpsc::UnboundedReceiver<Outbound>,
        tokio::task::JoinHandle<Session>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_event_loop(session(), inbound_rx, outbound_tx));

        inbound_tx.send(connection_joined(1, "racer")).unwrap();
        inbound_tx.send(player_joined(5, 1, "Racer")).unwrap();

        (inbound_tx, outbound_rx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pit_start_enters_after_settling() {
        let (inbound_tx, mut outbound_rx, handle) = start();

        inbound_tx.send(pit_start(5)).unwrap();

        sleep(Duration::from_millis(400)).await;
        assert_err!(outbound_rx.try_recv());

        sleep(Duration::from_millis(200)).await;
        let first = assert_ok!(outbound_rx.try_recv());
        assert_eq!(
            first,
            Outbound::LocalMessage("Racer^8 entered the pit lane".to_string())
        );

        drop(inbound_tx);
        let session = handle.await.unwrap();
        assert!(session.pit_lane().contains(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_cancels_pending_entry() {
        let (inbound_tx, mut outbound_rx, handle) = start();

        inbound_tx.send(pit_start(5)).unwrap();
        sleep(Duration::from_millis(200)).await;
        inbound_tx.send(Packet::PlayerPitted { player_id: 5 }).unwrap();

        sleep(Duration::from_millis(1000)).await;
        assert_err!(outbound_rx.try_recv());

        drop(inbound_tx);
        let session = handle.await.unwrap();
        assert!(!session.pit_lane().contains(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_message_cleared_after_timeout() {
        let (inbound_tx, mut outbound_rx, handle) = start();

        inbound_tx.send(pit_entry(5)).unwrap();
        sleep(Duration::from_millis(100)).await;
        while outbound_rx.try_recv().is_ok() {}

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(
            assert_ok!(outbound_rx.try_recv()),
            Outbound::Command("/rcc_all".to_string())
        );

        drop(inbound_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_cancels_speed_message_timer() {
        let (inbound_tx, mut outbound_rx, handle) = start();

        inbound_tx.send(pit_entry(5)).unwrap();
        sleep(Duration::from_millis(1000)).await;
        inbound_tx.send(pit_exit(5)).unwrap();
        sleep(Duration::from_millis(100)).await;

        let mut sent = Vec::new();
        while let Ok(outbound) = outbound_rx.try_recv() {
            sent.push(outbound);
        }
        assert!(sent.contains(&Outbound::Command("/rcc_ply racer".to_string())));

        sleep(Duration::from_millis(5000)).await;
        assert_err!(outbound_rx.try_recv());

        drop(inbound_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_event_loop_stops_when_stream_closes() {
        let (inbound_tx, _outbound_rx, handle) = start();
        drop(inbound_tx);

        let session = handle.await.unwrap();
        assert_eq!(session.registry().player_count(), 1);
        assert_eq!(session.registry().connection_count(), 1);
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = Server::new("127.0.0.1:0", session()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
