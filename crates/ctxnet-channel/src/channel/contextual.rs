use std::fmt;
use std::sync::Arc;

use ctxnet_buf::{
    BufConfig, ChunkPos, GridPos, Identifier, NetBuf, PayloadCodec, Result as BufResult,
};
use tracing::{trace, warn};

use super::{apply_outcome, log_decode_failure, Channel};
use crate::context::ChannelContext;
use crate::error::{HandlingResult, Result};
use crate::handling::{Direction, HandlingContext};
use crate::ids::{EntityId, PartitionId, PeerId};
use crate::transport::{Packet, PlatformTransport, Target};

type Handler<C, P> = dyn Fn(C, P, &HandlingContext) -> HandlingResult + Send + Sync;

/// A channel whose messages pertain to an object resolved through a
/// context tree.
///
/// Each message carries the object's location payload followed by the data
/// payload. On receipt both are decoded on the calling thread; resolving
/// the object and running the handler happen on the handling executor.
pub struct ContextualChannel<N: ChannelContext, P> {
    name: Identifier,
    context: Arc<N>,
    codec: PayloadCodec<P>,
    buf_config: BufConfig,
    to_client: Option<Arc<Handler<N::Context, P>>>,
    to_server: Option<Arc<Handler<N::Context, P>>>,
}

impl<N: ChannelContext, P: Send + 'static> ContextualChannel<N, P> {
    pub fn new(name: Identifier, context: N, codec: PayloadCodec<P>) -> Self {
        Self::with_shared_context(name, Arc::new(context), codec)
    }

    /// Build a channel over a context tree shared with other channels.
    pub fn with_shared_context(name: Identifier, context: Arc<N>, codec: PayloadCodec<P>) -> Self {
        Self {
            name,
            context,
            codec,
            buf_config: BufConfig::default(),
            to_client: None,
            to_server: None,
        }
    }

    pub fn with_buf_config(mut self, config: BufConfig) -> Self {
        self.buf_config = config;
        self
    }

    pub fn context(&self) -> &Arc<N> {
        &self.context
    }

    /// Handle messages arriving on the client. Replaces any previous
    /// client handler.
    pub fn recv_client(
        mut self,
        handler: impl Fn(N::Context, P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_client = Some(Arc::new(handler));
        self
    }

    /// Handle messages arriving on the server. Replaces any previous
    /// server handler.
    pub fn recv_server(
        mut self,
        handler: impl Fn(N::Context, P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_server = Some(Arc::new(handler));
        self
    }

    /// Handle messages arriving on either side with the same handler.
    pub fn recv_both(
        mut self,
        handler: impl Fn(N::Context, P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        let handler: Arc<Handler<N::Context, P>> = Arc::new(handler);
        self.to_client = Some(Arc::clone(&handler));
        self.to_server = Some(handler);
        self
    }

    /// Encode `context` and `data` into a packet for this channel.
    pub fn packet(&self, context: &N::Context, data: &P) -> Result<Packet> {
        let mut buf = NetBuf::with_config(self.buf_config);
        let location = self.context.encode_context(context);
        self.context.encode_payload(&location, &mut buf)?;
        self.codec.encode(&mut buf, data)?;
        Ok(Packet::new(self.name.clone(), buf.freeze()))
    }

    pub fn send(
        &self,
        transport: &dyn PlatformTransport,
        target: &Target,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        let packet = self.packet(context, data)?;
        trace!(channel = %self.name, %target, bytes = packet.payload.len(), "sending");
        transport.send(target, packet)?;
        Ok(())
    }

    pub fn send_to_peer(
        &self,
        transport: &dyn PlatformTransport,
        peer: PeerId,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::Peer(peer), context, data)
    }

    pub fn send_to_all(
        &self,
        transport: &dyn PlatformTransport,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::AllPeers, context, data)
    }

    pub fn send_to_server(
        &self,
        transport: &dyn PlatformTransport,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::Server, context, data)
    }

    pub fn send_to_partition(
        &self,
        transport: &dyn PlatformTransport,
        partition: PartitionId,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::Partition(partition), context, data)
    }

    pub fn send_to_tracking_entity(
        &self,
        transport: &dyn PlatformTransport,
        entity: EntityId,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::TrackingEntity(entity), context, data)
    }

    pub fn send_to_tracking_entity_and_self(
        &self,
        transport: &dyn PlatformTransport,
        entity: EntityId,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::TrackingEntityAndSelf(entity), context, data)
    }

    pub fn send_to_tracking_chunk(
        &self,
        transport: &dyn PlatformTransport,
        partition: PartitionId,
        chunk: ChunkPos,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        let target = Target::TrackingChunk { partition, chunk };
        self.send(transport, &target, context, data)
    }

    /// Send to every peer watching the chunk containing `pos`.
    pub fn send_to_tracking_block(
        &self,
        transport: &dyn PlatformTransport,
        partition: PartitionId,
        pos: GridPos,
        context: &N::Context,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::tracking_block(partition, pos), context, data)
    }

    fn handler(&self, direction: Direction) -> Option<&Arc<Handler<N::Context, P>>> {
        match direction {
            Direction::ToClient => self.to_client.as_ref(),
            Direction::ToServer => self.to_server.as_ref(),
        }
    }

    fn decode(&self, buf: &mut NetBuf) -> BufResult<(N::Payload, P)> {
        let location = self.context.decode_payload(buf)?;
        let data = self.codec.decode(buf)?;
        Ok((location, data))
    }
}

impl<N: ChannelContext, P: Send + 'static> Channel for ContextualChannel<N, P> {
    fn name(&self) -> &Identifier {
        &self.name
    }

    fn buf_config(&self) -> &BufConfig {
        &self.buf_config
    }

    fn receive(&self, direction: Direction, buf: &mut NetBuf, ctx: HandlingContext) {
        let (location, data) = match self.decode(buf) {
            Ok(decoded) => decoded,
            Err(err) => {
                log_decode_failure(&self.name, direction, &err);
                return;
            }
        };
        if buf.readable_bytes() > 0 {
            warn!(
                channel = %self.name,
                %direction,
                trailing = buf.readable_bytes(),
                "payload has unread trailing bytes"
            );
        }

        let Some(handler) = self.handler(direction).map(Arc::clone) else {
            trace!(channel = %self.name, %direction, "no handler registered; dropping payload");
            return;
        };
        let context = Arc::clone(&self.context);
        let name = self.name.clone();
        let task_ctx = ctx.clone();
        ctx.execute(Box::new(move || {
            let result = context
                .decode_context(&location, &task_ctx)
                .and_then(|resolved| handler(resolved, data, &task_ctx));
            apply_outcome(&name, direction, result, &task_ctx);
        }));
    }

    fn is_to_client(&self) -> bool {
        self.to_client.is_some()
    }

    fn is_to_server(&self) -> bool {
        self.to_server.is_some()
    }
}

impl<N: ChannelContext, P> fmt::Debug for ContextualChannel<N, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualChannel")
            .field("name", &self.name)
            .field("context", &std::any::type_name::<N>())
            .field("to_client", &self.to_client.is_some())
            .field("to_server", &self.to_server.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    use ctxnet_buf::NetPayload;

    use super::super::test_support::{counting, immediate, queued};
    use super::*;
    use crate::context::RootContext;
    use crate::error::{HandlingError, TransportError};
    use crate::executor::TaskQueue;

    #[derive(Debug, Clone, PartialEq)]
    struct Lamp {
        slot: i32,
        colors: [u8; 4],
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct SetColor {
        value: u8,
        index: u8,
    }

    impl NetPayload for SetColor {
        fn encode(&self, buf: &mut NetBuf) -> BufResult<()> {
            buf.write_u8(self.value);
            buf.write_u8(self.index);
            Ok(())
        }

        fn decode(buf: &mut NetBuf) -> BufResult<Self> {
            Ok(Self {
                value: buf.read_u8()?,
                index: buf.read_u8()?,
            })
        }
    }

    type Lamps = Arc<Mutex<HashMap<i32, Lamp>>>;

    fn lamp_context(lamps: Lamps) -> RootContext<Lamp, i32> {
        RootContext::new(
            PayloadCodec::new(
                |buf, slot: &i32| {
                    buf.write_var_i32(*slot);
                    Ok(())
                },
                |buf| buf.read_var_i32(),
            ),
            move |slot: &i32, _: &HandlingContext| {
                lamps
                    .lock()
                    .unwrap()
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| HandlingError::resolution(format!("no lamp in slot {slot}")))
            },
            |lamp: &Lamp| lamp.slot,
        )
    }

    fn lamps() -> Lamps {
        Arc::new(Mutex::new(HashMap::from([(
            2,
            Lamp {
                slot: 2,
                colors: [0; 4],
            },
        )])))
    }

    fn channel(lamps: Lamps) -> ContextualChannel<RootContext<Lamp, i32>, SetColor> {
        ContextualChannel::new(
            Identifier::parse("test:color").unwrap(),
            lamp_context(lamps),
            PayloadCodec::of(),
        )
    }

    fn packet_buf(packet: &Packet) -> NetBuf {
        NetBuf::from_bytes(&packet.payload)
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(Target, Packet)>>,
    }

    impl PlatformTransport for Recorder {
        fn send(&self, target: &Target, packet: Packet) -> std::result::Result<(), TransportError> {
            if *target == Target::Server {
                return Err(TransportError::InvalidTarget {
                    target: target.to_string(),
                    reason: "server side".into(),
                });
            }
            self.sent.lock().unwrap().push((target.clone(), packet));
            Ok(())
        }
    }

    #[test]
    fn test_packet_layout_is_location_then_data() {
        let lamps = lamps();
        let channel = channel(Arc::clone(&lamps));
        let lamp = lamps.lock().unwrap()[&2].clone();
        let packet = channel
            .packet(&lamp, &SetColor { value: 200, index: 0 })
            .unwrap();
        assert_eq!(packet.channel.to_string(), "test:color");
        assert_eq!(packet.payload.as_ref(), &[0x02, 200, 0]);
    }

    #[test]
    fn test_handler_runs_on_executor_thread() {
        let lamps = lamps();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let store = Arc::clone(&lamps);
        let channel = Arc::new(channel(Arc::clone(&lamps)).recv_client(
            move |lamp: Lamp, data: SetColor, _: &HandlingContext| {
                sink.lock().unwrap().push((thread::current().id(), lamp.slot, data));
                store.lock().unwrap().get_mut(&lamp.slot).unwrap().colors[data.index as usize] =
                    data.value;
                Ok(())
            },
        ));
        let lamp = lamps.lock().unwrap()[&2].clone();
        let packet = channel
            .packet(&lamp, &SetColor { value: 200, index: 0 })
            .unwrap();

        let queue = TaskQueue::new();
        let (ctx, _) = queued(&queue);
        let io = Arc::clone(&channel);
        let io_thread = thread::spawn(move || {
            io.receive(Direction::ToClient, &mut packet_buf(&packet), ctx);
            thread::current().id()
        })
        .join()
        .unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.run_pending(), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, thread::current().id());
        assert_ne!(seen[0].0, io_thread);
        assert_eq!((seen[0].1, seen[0].2), (2, SetColor { value: 200, index: 0 }));
        assert_eq!(lamps.lock().unwrap()[&2].colors, [200, 0, 0, 0]);
    }

    #[test]
    fn test_missing_context_is_logged_not_fatal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let channel = channel(lamps()).recv_server(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut buf = NetBuf::new();
        buf.write_var_i32(9);
        SetColor { value: 1, index: 1 }.encode(&mut buf).unwrap();

        let (ctx, reasons) = immediate();
        let ((), logs) = counting(|| channel.receive(Direction::ToServer, &mut buf, ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(logs.error_count(), 1);
        assert!(reasons.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_from_handler_closes_connection() {
        let lamps = lamps();
        let channel = channel(Arc::clone(&lamps)).recv_server(|_, data: SetColor, _| {
            if data.index >= 4 {
                return Err(HandlingError::disconnect(format!(
                    "color index {} out of range",
                    data.index
                )));
            }
            Ok(())
        });
        let lamp = lamps.lock().unwrap()[&2].clone();
        let packet = channel.packet(&lamp, &SetColor { value: 1, index: 9 }).unwrap();

        let (ctx, reasons) = immediate();
        channel.receive(Direction::ToServer, &mut packet_buf(&packet), ctx);
        assert_eq!(
            *reasons.lock().unwrap(),
            vec!["Channel test:color error: color index 9 out of range".to_string()]
        );
    }

    #[test]
    fn test_silent_handler_leaves_no_trace() {
        let lamps = lamps();
        let channel = channel(Arc::clone(&lamps)).recv_both(|_, _, _| Err(HandlingError::silent()));
        let lamp = lamps.lock().unwrap()[&2].clone();
        let packet = channel.packet(&lamp, &SetColor { value: 1, index: 0 }).unwrap();

        let (ctx, reasons) = immediate();
        let ((), logs) = counting(|| {
            channel.receive(Direction::ToClient, &mut packet_buf(&packet), ctx.clone());
            channel.receive(Direction::ToServer, &mut packet_buf(&packet), ctx);
        });
        assert_eq!(logs.total(), 0);
        assert!(reasons.lock().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_payload_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let channel = channel(lamps()).recv_client(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let (ctx, _) = immediate();
        let ((), logs) = counting(|| {
            channel.receive(Direction::ToClient, &mut NetBuf::from_bytes([0x02u8, 200]), ctx)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(logs.error_count(), 1);
    }

    #[test]
    fn test_direction_flags_follow_handlers() {
        let channel = channel(lamps());
        assert!(!channel.is_to_client() && !channel.is_to_server());
        let channel = channel.recv_server(|_, _, _| Ok(()));
        assert!(!channel.is_to_client());
        assert!(channel.is_to_server());
        assert!(channel.handles(Direction::ToServer));
    }

    #[test]
    fn test_send_helpers_route_targets() {
        let lamps = lamps();
        let channel = channel(Arc::clone(&lamps));
        let lamp = lamps.lock().unwrap()[&2].clone();
        let data = SetColor { value: 7, index: 3 };
        let transport = Recorder::default();
        let partition = PartitionId(Identifier::parse("test:nether").unwrap());

        channel.send_to_peer(&transport, PeerId(4), &lamp, &data).unwrap();
        let pos = GridPos::new(18, 0, -2);
        channel
            .send_to_tracking_block(&transport, partition.clone(), pos, &lamp, &data)
            .unwrap();
        assert!(matches!(
            channel.send_to_server(&transport, &lamp, &data),
            Err(crate::error::ChannelError::Transport(TransportError::InvalidTarget { .. }))
        ));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Target::Peer(PeerId(4)));
        assert_eq!(
            sent[1].0,
            Target::TrackingChunk {
                partition,
                chunk: ChunkPos::new(1, -1),
            }
        );
        assert_eq!(sent[1].1.payload.as_ref(), &[0x02, 7, 3]);
    }
}
