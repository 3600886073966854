use std::fmt;
use std::sync::Arc;

use ctxnet_buf::{BufConfig, Identifier, NetBuf, PayloadCodec};
use tracing::{trace, warn};

use super::{apply_outcome, log_decode_failure, Channel};
use crate::error::{HandlingResult, Result};
use crate::handling::{Direction, HandlingContext};
use crate::ids::PeerId;
use crate::transport::{Packet, PlatformTransport, Target};

type Handler<P> = dyn Fn(P, &HandlingContext) -> HandlingResult + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dispatch {
    /// Run on the transport thread that delivered the payload.
    Inline,
    /// Reschedule onto the handling executor.
    Executor,
}

struct Registered<P> {
    dispatch: Dispatch,
    handler: Arc<Handler<P>>,
}

impl<P> Clone for Registered<P> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// A channel whose messages carry only a data payload.
///
/// Handlers registered with `recv_*` run inline on the transport's thread
/// and must not touch main-loop state; `recv_sync_*` handlers are
/// rescheduled onto the handling executor.
pub struct NoContextChannel<P> {
    name: Identifier,
    codec: PayloadCodec<P>,
    buf_config: BufConfig,
    to_client: Option<Registered<P>>,
    to_server: Option<Registered<P>>,
}

impl<P: Send + 'static> NoContextChannel<P> {
    pub fn new(name: Identifier, codec: PayloadCodec<P>) -> Self {
        Self {
            name,
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

    pub fn recv_client(
        mut self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_client = Some(Registered {
            dispatch: Dispatch::Inline,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn recv_server(
        mut self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_server = Some(Registered {
            dispatch: Dispatch::Inline,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn recv(
        self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.both(Dispatch::Inline, Arc::new(handler))
    }

    pub fn recv_sync_client(
        mut self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_client = Some(Registered {
            dispatch: Dispatch::Executor,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn recv_sync_server(
        mut self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.to_server = Some(Registered {
            dispatch: Dispatch::Executor,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn recv_sync(
        self,
        handler: impl Fn(P, &HandlingContext) -> HandlingResult + Send + Sync + 'static,
    ) -> Self {
        self.both(Dispatch::Executor, Arc::new(handler))
    }

    fn both(mut self, dispatch: Dispatch, handler: Arc<Handler<P>>) -> Self {
        let registered = Registered { dispatch, handler };
        self.to_client = Some(registered.clone());
        self.to_server = Some(registered);
        self
    }

    pub fn packet(&self, data: &P) -> Result<Packet> {
        let mut buf = NetBuf::with_config(self.buf_config);
        self.codec.encode(&mut buf, data)?;
        Ok(Packet::new(self.name.clone(), buf.freeze()))
    }

    pub fn send(&self, transport: &dyn PlatformTransport, target: &Target, data: &P) -> Result<()> {
        let packet = self.packet(data)?;
        trace!(channel = %self.name, %target, bytes = packet.payload.len(), "sending");
        transport.send(target, packet)?;
        Ok(())
    }

    pub fn send_to_peer(
        &self,
        transport: &dyn PlatformTransport,
        peer: PeerId,
        data: &P,
    ) -> Result<()> {
        self.send(transport, &Target::Peer(peer), data)
    }

    pub fn send_to_all(&self, transport: &dyn PlatformTransport, data: &P) -> Result<()> {
        self.send(transport, &Target::AllPeers, data)
    }

    pub fn send_to_server(&self, transport: &dyn PlatformTransport, data: &P) -> Result<()> {
        self.send(transport, &Target::Server, data)
    }

    fn registered(&self, direction: Direction) -> Option<&Registered<P>> {
        match direction {
            Direction::ToClient => self.to_client.as_ref(),
            Direction::ToServer => self.to_server.as_ref(),
        }
    }
}

impl<P: Send + 'static> Channel for NoContextChannel<P> {
    fn name(&self) -> &Identifier {
        &self.name
    }

    fn buf_config(&self) -> &BufConfig {
        &self.buf_config
    }

    fn receive(&self, direction: Direction, buf: &mut NetBuf, ctx: HandlingContext) {
        let data = match self.codec.decode(buf) {
            Ok(data) => data,
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

        let Some(registered) = self.registered(direction) else {
            trace!(channel = %self.name, %direction, "no handler registered; dropping payload");
            return;
        };
        match registered.dispatch {
            Dispatch::Inline => {
                let result = (registered.handler)(data, &ctx);
                apply_outcome(&self.name, direction, result, &ctx);
            }
            Dispatch::Executor => {
                let handler = Arc::clone(&registered.handler);
                let name = self.name.clone();
                let task_ctx = ctx.clone();
                ctx.execute(Box::new(move || {
                    let result = handler(data, &task_ctx);
                    apply_outcome(&name, direction, result, &task_ctx);
                }));
            }
        }
    }

    fn is_to_client(&self) -> bool {
        self.to_client.is_some()
    }

    fn is_to_server(&self) -> bool {
        self.to_server.is_some()
    }
}

impl<P> fmt::Debug for NoContextChannel<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoContextChannel")
            .field("name", &self.name)
            .field("to_client", &self.to_client.as_ref().map(|r| r.dispatch))
            .field("to_server", &self.to_server.as_ref().map(|r| r.dispatch))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    use super::super::test_support::{counting, immediate, queued};
    use super::*;
    use crate::error::HandlingError;
    use crate::executor::TaskQueue;

    fn ping() -> NoContextChannel<String> {
        NoContextChannel::new(
            Identifier::parse("test:ping").unwrap(),
            PayloadCodec::new(|buf, s: &String| buf.write_string(s), |buf| buf.read_string()),
        )
    }

    fn deliver(
        channel: &Arc<NoContextChannel<String>>,
        direction: Direction,
        ctx: HandlingContext,
    ) -> ThreadId {
        let packet = channel.packet(&"hi".to_string()).unwrap();
        let channel = Arc::clone(channel);
        thread::spawn(move || {
            channel.receive(direction, &mut NetBuf::from_bytes(&packet.payload), ctx);
            thread::current().id()
        })
        .join()
        .unwrap()
    }

    #[test]
    fn test_inline_handler_runs_on_transport_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channel = Arc::new(ping().recv_client(move |msg: String, _: &HandlingContext| {
            sink.lock().unwrap().push((thread::current().id(), msg));
            Ok(())
        }));

        let queue = TaskQueue::new();
        let (ctx, _) = queued(&queue);
        let io = deliver(&channel, Direction::ToClient, ctx);

        assert_eq!(queue.run_pending(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![(io, "hi".to_string())]);
    }

    #[test]
    fn test_sync_handler_runs_on_executor() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channel = Arc::new(ping().recv_sync(move |msg: String, _: &HandlingContext| {
            sink.lock().unwrap().push((thread::current().id(), msg));
            Ok(())
        }));

        let queue = TaskQueue::new();
        let (ctx, _) = queued(&queue);
        deliver(&channel, Direction::ToServer, ctx);
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(thread::current().id(), "hi".to_string())]
        );
    }

    #[test]
    fn test_inline_failure_uses_same_policy() {
        let channel = ping().recv_server(|msg, _| {
            Err(HandlingError::disconnect(format!("unexpected {msg}")))
        });
        let (ctx, reasons) = immediate();
        let packet = channel.packet(&"hello".to_string()).unwrap();
        channel.receive(Direction::ToServer, &mut NetBuf::from_bytes(&packet.payload), ctx);
        assert_eq!(
            *reasons.lock().unwrap(),
            vec!["Channel test:ping error: unexpected hello".to_string()]
        );
    }

    #[test]
    fn test_unhandled_direction_is_ignored() {
        let channel = ping().recv_sync_client(|_, _| Err(HandlingError::error("never")));
        assert!(channel.is_to_client());
        assert!(!channel.is_to_server());

        let (ctx, _) = immediate();
        let packet = channel.packet(&"x".to_string()).unwrap();
        let ((), logs) = counting(|| {
            channel.receive(Direction::ToServer, &mut NetBuf::from_bytes(&packet.payload), ctx)
        });
        assert_eq!(logs.error_count(), 0);
    }

    #[test]
    fn test_trailing_bytes_warn() {
        let channel = ping().recv(|_, _| Ok(()));
        let mut buf = NetBuf::new();
        buf.write_string("x").unwrap();
        buf.write_u8(0xff);
        let (ctx, _) = immediate();
        let ((), logs) = counting(|| channel.receive(Direction::ToClient, &mut buf, ctx));
        assert_eq!(logs.warn_count(), 1);
        assert_eq!(logs.error_count(), 0);
    }
}
