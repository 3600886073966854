use std::sync::{mpsc, Arc};
use std::time::Duration;

use ctxnet_buf::Identifier;
use ctxnet_channel::{
    Direction, HandlingContext, Packet, Participant, PeerId, PlatformTransport, Receiver,
    Registrar, Target, TaskQueue, TransportError,
};
use tracing::{trace, warn};

use crate::config::LoopbackConfig;
use crate::hub::Hub;
use crate::io::{IoEvent, IoThread, Receivers};
use crate::server::encode_bounded;

/// One connected client, with its own main-loop queue and I/O thread.
///
/// Created by [`LoopbackNetwork::connect`](crate::LoopbackNetwork::connect).
/// Dropping the endpoint closes the connection.
pub struct ClientEndpoint {
    peer: PeerId,
    hub: Arc<Hub>,
    server: mpsc::Sender<IoEvent>,
    queue: TaskQueue,
    receivers: Receivers,
    io: IoThread,
    config: LoopbackConfig,
}

impl ClientEndpoint {
    pub(crate) fn spawn(
        peer: PeerId,
        hub: Arc<Hub>,
        server: mpsc::Sender<IoEvent>,
        participant: Option<Arc<dyn Participant>>,
        config: LoopbackConfig,
    ) -> Result<Self, TransportError> {
        let queue = TaskQueue::new();
        let receivers = Receivers::default();

        let executor = queue.executor();
        let ctx_hub = Arc::clone(&hub);
        let io = IoThread::spawn(
            format!("{}-{peer}", config.thread_name),
            receivers.clone(),
            Box::new(move |_| {
                if !ctx_hub.is_open(peer) {
                    return None;
                }
                let hub = Arc::clone(&ctx_hub);
                Some(HandlingContext::new(
                    Arc::clone(&executor),
                    participant.clone(),
                    Arc::new(move |reason: String| {
                        hub.close(peer, reason);
                    }),
                ))
            }),
        )?;

        Ok(Self {
            peer,
            hub,
            server,
            queue,
            receivers,
            io,
            config,
        })
    }

    pub(crate) fn inbox(&self) -> mpsc::Sender<IoEvent> {
        self.io.inbox()
    }

    /// The id the server knows this client by.
    pub fn peer_id(&self) -> PeerId {
        self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.hub.is_open(self.peer)
    }

    /// Why the connection was closed, if it was.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.hub.disconnect_reason(self.peer)
    }

    /// Close the connection from the client side.
    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        self.hub.close(self.peer, reason.into())
    }

    /// Run every task queued on the client main loop.
    pub fn run_pending(&self) -> usize {
        self.queue.run_pending()
    }

    pub fn run_next(&self, timeout: Duration) -> bool {
        self.queue.run_next(timeout)
    }

    /// Wait until the client I/O thread has delivered everything sent to
    /// it so far.
    pub fn settle(&self, timeout: Duration) -> bool {
        self.io.settle(timeout)
    }
}

impl PlatformTransport for ClientEndpoint {
    fn send(&self, target: &Target, packet: Packet) -> Result<(), TransportError> {
        if !target.allowed(Direction::ToServer) {
            warn!(peer = %self.peer, %target, channel = %packet.channel, "client can only send to the server");
            return Err(TransportError::InvalidTarget {
                target: target.to_string(),
                reason: "clients can only send to the server".to_string(),
            });
        }
        if !self.hub.is_open(self.peer) {
            return Err(TransportError::Closed);
        }
        let bytes = encode_bounded(&packet, self.config.max_packet_size)?;
        self.server
            .send(IoEvent::Packet {
                bytes,
                from: Some(self.peer),
            })
            .map_err(|_| TransportError::Closed)?;
        trace!(peer = %self.peer, channel = %packet.channel, "client sent");
        Ok(())
    }
}

impl Registrar for ClientEndpoint {
    fn register_receiver(&mut self, channel: Identifier, direction: Direction, receiver: Receiver) {
        if direction != Direction::ToClient {
            trace!(%channel, %direction, "client ignores server-bound subscription");
            return;
        }
        self.receivers.insert(channel, receiver);
    }
}

impl Drop for ClientEndpoint {
    fn drop(&mut self) {
        self.hub.close(self.peer, "client endpoint dropped".to_string());
    }
}
