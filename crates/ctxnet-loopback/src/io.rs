//! The per-endpoint I/O thread: the only place inbound bytes are decoded
//! and handed to channel receivers.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use ctxnet_buf::Identifier;
use ctxnet_channel::{decode_packet, HandlingContext, PeerId, Receiver};
use tracing::{debug, trace, warn};

pub(crate) enum IoEvent {
    /// An encoded packet, tagged with the sending peer when the receiving
    /// side is the server.
    Packet { bytes: Bytes, from: Option<PeerId> },
    /// Acknowledge once everything queued before it has been delivered.
    Barrier(mpsc::Sender<()>),
    Shutdown,
}

/// Receivers registered on one endpoint, keyed by channel name.
#[derive(Clone, Default)]
pub(crate) struct Receivers(Arc<RwLock<HashMap<Identifier, Receiver>>>);

impl Receivers {
    pub(crate) fn insert(&self, channel: Identifier, receiver: Receiver) {
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if map.insert(channel.clone(), receiver).is_some() {
            debug!(%channel, "replaced receiver");
        }
    }

    fn get(&self, channel: &Identifier) -> Option<Receiver> {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner);
        map.get(channel).cloned()
    }
}

/// Builds the handling context for a packet, or `None` if the sending
/// connection is already closed.
pub(crate) type ContextFactory = Box<dyn Fn(Option<PeerId>) -> Option<HandlingContext> + Send>;

pub(crate) struct IoThread {
    inbox: mpsc::Sender<IoEvent>,
    handle: Option<JoinHandle<()>>,
}

impl IoThread {
    pub(crate) fn spawn(
        name: String,
        receivers: Receivers,
        make_ctx: ContextFactory,
    ) -> io::Result<Self> {
        let (inbox, events) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run(events, receivers, make_ctx))?;
        Ok(Self {
            inbox,
            handle: Some(handle),
        })
    }

    /// A handle other endpoints use to deliver to this one.
    pub(crate) fn inbox(&self) -> mpsc::Sender<IoEvent> {
        self.inbox.clone()
    }

    /// Wait until every event queued before this call has been handled.
    pub(crate) fn settle(&self, timeout: Duration) -> bool {
        let (ack, done) = mpsc::channel();
        if self.inbox.send(IoEvent::Barrier(ack)).is_err() {
            return false;
        }
        done.recv_timeout(timeout).is_ok()
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        let _ = self.inbox.send(IoEvent::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("loopback I/O thread panicked");
            }
        }
    }
}

fn run(events: mpsc::Receiver<IoEvent>, receivers: Receivers, make_ctx: ContextFactory) {
    while let Ok(event) = events.recv() {
        match event {
            IoEvent::Packet { bytes, from } => deliver(bytes, from, &receivers, &make_ctx),
            IoEvent::Barrier(ack) => {
                let _ = ack.send(());
            }
            IoEvent::Shutdown => break,
        }
    }
    trace!("loopback I/O thread exiting");
}

fn deliver(bytes: Bytes, from: Option<PeerId>, receivers: &Receivers, make_ctx: &ContextFactory) {
    let packet = match decode_packet(&bytes) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(error = %err, "dropping packet with unreadable channel name");
            return;
        }
    };
    let Some(receiver) = receivers.get(&packet.channel) else {
        debug!(channel = %packet.channel, "no receiver for channel");
        return;
    };
    let Some(ctx) = make_ctx(from) else {
        debug!(channel = %packet.channel, "dropping packet from closed connection");
        return;
    };
    receiver(packet.payload, ctx);
}
