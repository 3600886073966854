use std::collections::{HashMap, HashSet};

use ctxnet_buf::ChunkPos;
use ctxnet_channel::{EntityId, PartitionId, PeerId, Target};

/// Server-side knowledge of where each peer is and what it can see.
#[derive(Debug, Default)]
pub(crate) struct Routes {
    partition: HashMap<PeerId, PartitionId>,
    entity: HashMap<PeerId, EntityId>,
    tracked_entities: HashMap<PeerId, HashSet<EntityId>>,
    tracked_chunks: HashMap<PeerId, HashSet<(PartitionId, ChunkPos)>>,
}

impl Routes {
    pub(crate) fn set_partition(&mut self, peer: PeerId, partition: PartitionId) {
        self.partition.insert(peer, partition);
    }

    pub(crate) fn set_entity(&mut self, peer: PeerId, entity: EntityId) {
        self.entity.insert(peer, entity);
    }

    pub(crate) fn track_entity(&mut self, peer: PeerId, entity: EntityId) {
        self.tracked_entities.entry(peer).or_default().insert(entity);
    }

    pub(crate) fn track_chunk(&mut self, peer: PeerId, partition: PartitionId, chunk: ChunkPos) {
        self.tracked_chunks
            .entry(peer)
            .or_default()
            .insert((partition, chunk));
    }

    pub(crate) fn forget(&mut self, peer: PeerId) {
        self.partition.remove(&peer);
        self.entity.remove(&peer);
        self.tracked_entities.remove(&peer);
        self.tracked_chunks.remove(&peer);
    }

    /// Whether a packet sent to `target` should reach `peer`.
    pub(crate) fn matches(&self, peer: PeerId, target: &Target) -> bool {
        match target {
            Target::Peer(p) => *p == peer,
            Target::AllPeers => true,
            Target::Server => false,
            Target::TrackingEntity(id) => self.tracks_entity(peer, *id),
            Target::TrackingEntityAndSelf(id) => {
                self.tracks_entity(peer, *id) || self.entity.get(&peer) == Some(id)
            }
            Target::TrackingChunk { partition, chunk } => self
                .tracked_chunks
                .get(&peer)
                .is_some_and(|chunks| chunks.contains(&(partition.clone(), *chunk))),
            Target::Partition(partition) => self.partition.get(&peer) == Some(partition),
        }
    }

    fn tracks_entity(&self, peer: PeerId, id: EntityId) -> bool {
        self.tracked_entities
            .get(&peer)
            .is_some_and(|ids| ids.contains(&id))
    }
}
