//! The seam between channels and the platform that actually moves bytes.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use ctxnet_buf::{ChunkPos, GridPos, Identifier, NetBuf, Result as BufResult};

use crate::error::TransportError;
use crate::handling::{Direction, HandlingContext};
use crate::ids::{EntityId, PartitionId, PeerId};

/// Who a packet is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// One connected peer. Server side only.
    Peer(PeerId),
    /// Every connected peer. Server side only.
    AllPeers,
    /// The server. Client side only.
    Server,
    /// Every peer that can see the entity.
    TrackingEntity(EntityId),
    /// Every peer that can see the entity, plus the entity's own peer.
    TrackingEntityAndSelf(EntityId),
    /// Every peer that has the chunk loaded.
    TrackingChunk {
        partition: PartitionId,
        chunk: ChunkPos,
    },
    /// Every peer in the partition.
    Partition(PartitionId),
}

impl Target {
    /// Peers watching the chunk that contains `pos`.
    pub fn tracking_block(partition: PartitionId, pos: GridPos) -> Self {
        Self::TrackingChunk {
            partition,
            chunk: ChunkPos::from(pos),
        }
    }

    /// Whether the selector is meaningful when sent from `direction`'s
    /// origin side.
    pub fn allowed(&self, direction: Direction) -> bool {
        match self {
            Self::Server => direction == Direction::ToServer,
            _ => direction == Direction::ToClient,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peer(peer) => write!(f, "{peer}"),
            Self::AllPeers => f.write_str("all peers"),
            Self::Server => f.write_str("server"),
            Self::TrackingEntity(id) => write!(f, "peers tracking entity {id}"),
            Self::TrackingEntityAndSelf(id) => write!(f, "entity {id} and its trackers"),
            Self::TrackingChunk { partition, chunk } => {
                write!(f, "peers tracking chunk {chunk} in {partition}")
            }
            Self::Partition(partition) => write!(f, "peers in {partition}"),
        }
    }
}

/// A channel message ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The channel the message belongs to.
    pub channel: Identifier,
    /// Location payload followed by data payload.
    pub payload: Bytes,
}

impl Packet {
    pub fn new(channel: Identifier, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }
}

/// Encode a packet as `[channel name][payload]`.
///
/// The payload is not length-prefixed; the transport frames whole packets.
pub fn encode_packet(packet: &Packet) -> BufResult<Bytes> {
    let mut buf = NetBuf::new();
    buf.write_identifier(&packet.channel)?;
    buf.write_bytes(&packet.payload);
    Ok(buf.freeze())
}

/// Split a received packet into its channel name and payload.
pub fn decode_packet(bytes: impl AsRef<[u8]>) -> BufResult<Packet> {
    let mut buf = NetBuf::from_bytes(bytes);
    let channel = buf.read_identifier()?;
    let payload = buf.read_remaining();
    Ok(Packet { channel, payload })
}

/// Sends packets on behalf of channels.
///
/// One adapter exists per platform. Delivery is fire-and-forget: `Ok`
/// means the packet was accepted for routing, not that anyone received it.
pub trait PlatformTransport: Send + Sync {
    fn send(&self, target: &Target, packet: Packet) -> Result<(), TransportError>;
}

/// Inbound hook a transport calls with a packet's payload.
pub type Receiver = Arc<dyn Fn(Bytes, HandlingContext) + Send + Sync>;

/// Accepts per-channel inbound subscriptions.
pub trait Registrar {
    fn register_receiver(&mut self, channel: Identifier, direction: Direction, receiver: Receiver);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_encode_decode_packet() {
        let packet = Packet::new(id("demo:color-update"), vec![0x0c, 0xc8, 0x00]);
        let bytes = encode_packet(&packet).unwrap();

        assert_eq!(bytes[0] as usize, "demo:color-update".len());
        assert_eq!(&bytes[bytes.len() - 3..], &[0x0c, 0xc8, 0x00]);
        assert_eq!(decode_packet(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::new(id("demo:ping"), Bytes::new());
        let decoded = decode_packet(encode_packet(&packet).unwrap()).unwrap();
        assert_eq!(decoded.channel, packet.channel);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_decode_invalid_channel_name() {
        let mut buf = NetBuf::new();
        buf.write_string("Not An Id").unwrap();
        assert!(decode_packet(buf.freeze()).is_err());
    }

    #[test]
    fn test_tracking_block_uses_containing_chunk() {
        let partition = PartitionId(id("demo:overworld"));
        let target = Target::tracking_block(partition.clone(), GridPos::new(-1, 70, 33));
        assert_eq!(
            target,
            Target::TrackingChunk {
                partition,
                chunk: ChunkPos::new(-1, 2),
            }
        );
        assert_eq!(
            target.to_string(),
            "peers tracking chunk [-1, 2] in demo:overworld"
        );
    }

    #[test]
    fn test_target_side() {
        assert!(Target::Server.allowed(Direction::ToServer));
        assert!(!Target::Server.allowed(Direction::ToClient));
        assert!(Target::AllPeers.allowed(Direction::ToClient));
        assert!(!Target::Peer(PeerId(1)).allowed(Direction::ToServer));
    }
}
