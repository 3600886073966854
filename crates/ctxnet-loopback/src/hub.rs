//! Connection table shared by the server endpoint and its clients.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use ctxnet_channel::{Participant, PeerId, Target, TransportError};
use tracing::debug;

use crate::io::IoEvent;
use crate::routing::Routes;

pub(crate) struct PeerSlot {
    /// What the server sees as the participant behind this peer.
    pub(crate) participant: Option<Arc<dyn Participant>>,
    /// The client endpoint's I/O thread.
    pub(crate) inbox: mpsc::Sender<IoEvent>,
}

/// Reasons for the most recent disconnects, oldest first.
struct ClosedLog {
    entries: VecDeque<(PeerId, String)>,
    capacity: usize,
}

impl ClosedLog {
    fn record(&mut self, peer: PeerId, reason: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((peer, reason));
    }

    fn reason(&self, peer: PeerId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(closed, _)| *closed == peer)
            .map(|(_, reason)| reason.as_str())
    }
}

/// Open peers live in `peers`; closing a peer drops its slot and routes and
/// keeps only the reason, in a log bounded by `closed_history`.
pub(crate) struct Hub {
    next_peer: AtomicU64,
    peers: RwLock<BTreeMap<PeerId, PeerSlot>>,
    closed: Mutex<ClosedLog>,
    routes: RwLock<Routes>,
}

impl Hub {
    pub(crate) fn new(closed_history: usize) -> Self {
        Self {
            next_peer: AtomicU64::new(1),
            peers: RwLock::new(BTreeMap::new()),
            closed: Mutex::new(ClosedLog {
                entries: VecDeque::new(),
                capacity: closed_history,
            }),
            routes: RwLock::new(Routes::default()),
        }
    }

    pub(crate) fn next_peer_id(&self) -> PeerId {
        PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn attach(&self, peer: PeerId, slot: PeerSlot) {
        self.peers_mut().insert(peer, slot);
    }

    /// Close `peer`, keeping the first reason given. Returns whether this
    /// call closed it.
    pub(crate) fn close(&self, peer: PeerId, reason: String) -> bool {
        {
            // First caller wins.
            let mut peers = self.peers_mut();
            if peers.remove(&peer).is_none() {
                return false;
            }
            debug!(%peer, %reason, "closing loopback connection");
            self.closed_log().record(peer, reason);
        }
        self.routes_mut().forget(peer);
        true
    }

    pub(crate) fn is_open(&self, peer: PeerId) -> bool {
        self.peers().contains_key(&peer)
    }

    /// Why `peer` was closed, while the reason is still in the log.
    pub(crate) fn disconnect_reason(&self, peer: PeerId) -> Option<String> {
        self.closed_log().reason(peer).map(str::to_string)
    }

    /// The server's participant for an open peer, or `None` if the peer
    /// is closed or unknown.
    pub(crate) fn open_participant(&self, peer: PeerId) -> Option<Option<Arc<dyn Participant>>> {
        self.peers().get(&peer).map(|slot| slot.participant.clone())
    }

    pub(crate) fn open_peers(&self) -> Vec<PeerId> {
        self.peers().keys().copied().collect()
    }

    pub(crate) fn routes_mut(&self) -> RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `bytes` to every open peer the target selects. Returns the
    /// number of peers reached.
    pub(crate) fn deliver(&self, target: &Target, bytes: Bytes) -> Result<usize, TransportError> {
        let peers = self.peers();
        if let Target::Peer(peer) = target {
            let Some(slot) = peers.get(peer) else {
                return Err(if self.closed_log().reason(*peer).is_some() {
                    TransportError::Closed
                } else {
                    TransportError::UnknownPeer(*peer)
                });
            };
            slot.inbox
                .send(IoEvent::Packet { bytes, from: None })
                .map_err(|_| TransportError::Closed)?;
            return Ok(1);
        }

        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        let mut reached = 0;
        for (peer, slot) in peers.iter() {
            if !routes.matches(*peer, target) {
                continue;
            }
            let event = IoEvent::Packet {
                bytes: bytes.clone(),
                from: None,
            };
            if slot.inbox.send(event).is_err() {
                debug!(%peer, "client endpoint gone; skipping");
                continue;
            }
            reached += 1;
        }
        Ok(reached)
    }

    fn peers(&self) -> RwLockReadGuard<'_, BTreeMap<PeerId, PeerSlot>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn peers_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<PeerId, PeerSlot>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed_log(&self) -> MutexGuard<'_, ClosedLog> {
        self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(hub: &Hub) -> (PeerId, mpsc::Receiver<IoEvent>) {
        let (inbox, rx) = mpsc::channel();
        let peer = hub.next_peer_id();
        hub.attach(
            peer,
            PeerSlot {
                participant: None,
                inbox,
            },
        );
        (peer, rx)
    }

    #[test]
    fn test_close_drops_the_slot() {
        let hub = Hub::new(8);
        let (peer, rx) = attach(&hub);
        assert!(hub.close(peer, "bye".to_string()));

        assert!(hub.open_peers().is_empty());
        // The slot held the only sender.
        assert!(rx.recv().is_err());
        assert_eq!(hub.disconnect_reason(peer).as_deref(), Some("bye"));
        assert!(!hub.close(peer, "again".to_string()));
        assert_eq!(hub.disconnect_reason(peer).as_deref(), Some("bye"));
    }

    #[test]
    fn test_closed_log_is_bounded() {
        let hub = Hub::new(2);
        let peers: Vec<_> = (0..3).map(|_| attach(&hub)).collect();
        for (i, (peer, _)) in peers.iter().enumerate() {
            hub.close(*peer, format!("reason {i}"));
        }

        assert_eq!(hub.disconnect_reason(peers[0].0), None);
        assert_eq!(hub.disconnect_reason(peers[2].0).as_deref(), Some("reason 2"));
        assert!(matches!(
            hub.deliver(&Target::Peer(peers[0].0), Bytes::new()),
            Err(TransportError::UnknownPeer(_))
        ));
        assert!(matches!(
            hub.deliver(&Target::Peer(peers[1].0), Bytes::new()),
            Err(TransportError::Closed)
        ));
    }
}
