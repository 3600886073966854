use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ctxnet_buf::{ChunkPos, Identifier};
use ctxnet_channel::{
    encode_packet, Direction, EntityId, Executor, HandlingContext, Packet, PartitionId,
    Participant, PeerId, PlatformTransport, Receiver, Registrar, Target, TaskQueue,
    TransportError,
};
use tracing::{debug, trace, warn};

use crate::client::ClientEndpoint;
use crate::config::LoopbackConfig;
use crate::hub::{Hub, PeerSlot};
use crate::io::{IoThread, Receivers};

/// The server side of an in-memory network.
///
/// Owns the server's main-loop queue and I/O thread, the routing tables
/// used by broadcast targets, and the table of connected peers.
pub struct LoopbackNetwork {
    hub: Arc<Hub>,
    queue: TaskQueue,
    receivers: Receivers,
    io: IoThread,
    config: LoopbackConfig,
}

impl LoopbackNetwork {
    pub fn new(config: LoopbackConfig) -> Result<Self, TransportError> {
        let hub = Arc::new(Hub::new(config.closed_history));
        let queue = TaskQueue::new();
        let receivers = Receivers::default();

        let executor = queue.executor();
        let ctx_hub = Arc::clone(&hub);
        let io = IoThread::spawn(
            format!("{}-server", config.thread_name),
            receivers.clone(),
            Box::new(move |from| {
                let peer = from?;
                let participant = ctx_hub.open_participant(peer)?;
                Some(server_context(&ctx_hub, peer, participant, &executor))
            }),
        )?;

        Ok(Self {
            hub,
            queue,
            receivers,
            io,
            config,
        })
    }

    /// Connect a new client endpoint.
    ///
    /// `server_view` is the participant server handlers see for the new
    /// peer; `client_view` is the client's own local participant.
    pub fn connect(
        &self,
        server_view: Option<Arc<dyn Participant>>,
        client_view: Option<Arc<dyn Participant>>,
    ) -> Result<ClientEndpoint, TransportError> {
        let peer = self.hub.next_peer_id();
        let client = ClientEndpoint::spawn(
            peer,
            Arc::clone(&self.hub),
            self.io.inbox(),
            client_view,
            self.config.clone(),
        )?;
        self.hub.attach(
            peer,
            PeerSlot {
                participant: server_view,
                inbox: client.inbox(),
            },
        );
        debug!(%peer, "loopback client connected");
        Ok(client)
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Peers that are still connected, in id order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.hub.open_peers()
    }

    pub fn set_partition(&self, peer: PeerId, partition: PartitionId) {
        self.hub.routes_mut().set_partition(peer, partition);
    }

    /// Record the entity a peer controls, for `TrackingEntityAndSelf`.
    pub fn set_entity(&self, peer: PeerId, entity: EntityId) {
        self.hub.routes_mut().set_entity(peer, entity);
    }

    pub fn track_entity(&self, peer: PeerId, entity: EntityId) {
        self.hub.routes_mut().track_entity(peer, entity);
    }

    pub fn track_chunk(&self, peer: PeerId, partition: PartitionId, chunk: ChunkPos) {
        self.hub.routes_mut().track_chunk(peer, partition, chunk);
    }

    /// Close a peer from the server side.
    pub fn disconnect(&self, peer: PeerId, reason: impl Into<String>) -> bool {
        self.hub.close(peer, reason.into())
    }

    /// Why `peer` was disconnected, if it was.
    pub fn disconnect_reason(&self, peer: PeerId) -> Option<String> {
        self.hub.disconnect_reason(peer)
    }

    /// Run every task queued on the server main loop.
    pub fn run_pending(&self) -> usize {
        self.queue.run_pending()
    }

    pub fn run_next(&self, timeout: Duration) -> bool {
        self.queue.run_next(timeout)
    }

    /// Wait until the server I/O thread has delivered everything sent to
    /// it so far.
    pub fn settle(&self, timeout: Duration) -> bool {
        self.io.settle(timeout)
    }
}

impl PlatformTransport for LoopbackNetwork {
    fn send(&self, target: &Target, packet: Packet) -> Result<(), TransportError> {
        if !target.allowed(Direction::ToClient) {
            warn!(%target, channel = %packet.channel, "server cannot route to this target");
            return Err(TransportError::InvalidTarget {
                target: target.to_string(),
                reason: "the server cannot send to itself".to_string(),
            });
        }
        let bytes = encode_bounded(&packet, self.config.max_packet_size)?;
        let reached = self.hub.deliver(target, bytes)?;
        trace!(%target, channel = %packet.channel, reached, "server sent");
        Ok(())
    }
}

impl Registrar for LoopbackNetwork {
    fn register_receiver(&mut self, channel: Identifier, direction: Direction, receiver: Receiver) {
        if direction != Direction::ToServer {
            trace!(%channel, %direction, "server ignores client-bound subscription");
            return;
        }
        self.receivers.insert(channel, receiver);
    }
}

fn server_context(
    hub: &Arc<Hub>,
    peer: PeerId,
    participant: Option<Arc<dyn Participant>>,
    executor: &Arc<dyn Executor>,
) -> HandlingContext {
    let hub = Arc::clone(hub);
    HandlingContext::new(
        Arc::clone(executor),
        participant,
        Arc::new(move |reason: String| {
            hub.close(peer, reason);
        }),
    )
}

/// Encode a packet, rejecting it if it exceeds `max` bytes.
pub(crate) fn encode_bounded(packet: &Packet, max: usize) -> Result<Bytes, TransportError> {
    let bytes = encode_packet(packet)?;
    if bytes.len() > max {
        warn!(channel = %packet.channel, size = bytes.len(), max, "packet too large to send");
        return Err(TransportError::PacketTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ctxnet_buf::{GridPos, PayloadCodec};
    use ctxnet_channel::{ChannelRegistry, HandlingError, NoContextChannel};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn overworld() -> PartitionId {
        PartitionId(id("demo:overworld"))
    }

    fn text_channel(name: &str) -> NoContextChannel<String> {
        NoContextChannel::new(
            id(name),
            PayloadCodec::new(|buf, s: &String| buf.write_string(s), |buf| buf.read_string()),
        )
    }

    fn inbox_channel(name: &str, seen: &Arc<Mutex<Vec<String>>>) -> NoContextChannel<String> {
        let sink = Arc::clone(seen);
        text_channel(name).recv_sync_client(move |msg, _| {
            sink.lock().unwrap().push(msg);
            Ok(())
        })
    }

    #[test]
    fn test_server_rejects_server_target() {
        let network = LoopbackNetwork::new(LoopbackConfig::default()).unwrap();
        let err = network
            .send(&Target::Server, Packet::new(id("test:a"), Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidTarget { .. }));
    }

    #[test]
    fn test_unknown_peer() {
        let network = LoopbackNetwork::new(LoopbackConfig::default()).unwrap();
        let err = network
            .send(&Target::Peer(PeerId(42)), Packet::new(id("test:a"), Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(PeerId(42))));
    }

    #[test]
    fn test_packet_size_limit() {
        let network = LoopbackNetwork::new(LoopbackConfig {
            max_packet_size: 16,
            ..Default::default()
        })
        .unwrap();
        let _client = network.connect(None, None).unwrap();
        let err = network
            .send(
                &Target::AllPeers,
                Packet::new(id("test:a"), Bytes::from(vec![0u8; 32])),
            )
            .unwrap_err();
        assert!(matches!(err, TransportError::PacketTooLarge { max: 16, .. }));
    }

    #[test]
    fn test_chunk_broadcast_reaches_only_trackers() {
        let seen_near = Arc::new(Mutex::new(Vec::new()));
        let seen_far = Arc::new(Mutex::new(Vec::new()));
        let network = LoopbackNetwork::new(LoopbackConfig::default()).unwrap();
        let mut near = network.connect(None, None).unwrap();
        let mut far = network.connect(None, None).unwrap();

        let mut near_registry = ChannelRegistry::new();
        near_registry
            .register(inbox_channel("test:news", &seen_near))
            .unwrap();
        near_registry.install(&mut near);
        let mut far_registry = ChannelRegistry::new();
        let news = far_registry
            .register(inbox_channel("test:news", &seen_far))
            .unwrap();
        far_registry.install(&mut far);

        network.track_chunk(near.peer_id(), overworld(), ChunkPos::new(0, 0));
        let target = Target::tracking_block(overworld(), GridPos::new(3, 70, 9));
        news.send(&network, &target, &"block".to_string()).unwrap();

        assert!(near.settle(WAIT));
        assert!(far.settle(WAIT));
        near.run_pending();
        far.run_pending();
        assert_eq!(*seen_near.lock().unwrap(), vec!["block".to_string()]);
        assert!(seen_far.lock().unwrap().is_empty());
    }

    #[test]
    fn test_server_handler_disconnects_peer() {
        let mut network = LoopbackNetwork::new(LoopbackConfig::default()).unwrap();
        let mut registry = ChannelRegistry::new();
        let chat = registry
            .register(text_channel("test:chat").recv_sync_server(|msg, _| {
                Err(HandlingError::disconnect(format!("bad word {msg}")))
            }))
            .unwrap();
        registry.install(&mut network);

        let mut client = network.connect(None, None).unwrap();
        registry.install(&mut client);
        let peer = client.peer_id();

        chat.send_to_server(&client, &"boo".to_string()).unwrap();
        assert!(network.settle(WAIT));
        assert_eq!(network.run_pending(), 1);

        let reason = "Channel test:chat error: bad word boo".to_string();
        assert_eq!(network.disconnect_reason(peer), Some(reason.clone()));
        assert_eq!(client.disconnect_reason(), Some(reason));
        assert!(network.peers().is_empty());
        assert!(matches!(
            chat.send_to_peer(&network, peer, &"late".to_string()),
            Err(ctxnet_channel::ChannelError::Transport(TransportError::Closed))
        ));
        assert!(matches!(
            chat.send_to_server(&client, &"late".to_string()),
            Err(ctxnet_channel::ChannelError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn test_first_disconnect_reason_wins() {
        let network = LoopbackNetwork::new(LoopbackConfig::default()).unwrap();
        let client = network.connect(None, None).unwrap();
        assert!(network.disconnect(client.peer_id(), "kicked"));
        assert!(!network.disconnect(client.peer_id(), "again"));
        assert_eq!(client.disconnect_reason().as_deref(), Some("kicked"));
    }
}
