use std::fmt;
use std::sync::Arc;

use ctxnet_buf::{NetBuf, PayloadCodec, Result as BufResult};

use super::ChannelContext;
use crate::error::HandlingResult;
use crate::handling::HandlingContext;

type ChildDecoder<N, C, P> =
    dyn Fn(&<N as ChannelContext>::Context, &P, &HandlingContext) -> HandlingResult<C> + Send + Sync;
type ChildEncoder<C, P> = dyn Fn(&C) -> P + Send + Sync;
type ParentFinder<N, C> = dyn Fn(&C) -> <N as ChannelContext>::Context + Send + Sync;

/// A node whose objects live inside the objects of a parent node.
///
/// The location payload is the parent's payload followed by this node's
/// own bytes.
pub struct ChildContext<N: ChannelContext, C, P> {
    parent: Arc<N>,
    codec: PayloadCodec<P>,
    decoder: Arc<ChildDecoder<N, C, P>>,
    encoder: Arc<ChildEncoder<C, P>>,
    parent_finder: Arc<ParentFinder<N, C>>,
}

impl<N: ChannelContext, C, P> ChildContext<N, C, P> {
    pub fn new(
        parent: Arc<N>,
        codec: PayloadCodec<P>,
        decoder: impl Fn(&N::Context, &P, &HandlingContext) -> HandlingResult<C>
            + Send
            + Sync
            + 'static,
        encoder: impl Fn(&C) -> P + Send + Sync + 'static,
        parent_finder: impl Fn(&C) -> N::Context + Send + Sync + 'static,
    ) -> Self {
        Self {
            parent,
            codec,
            decoder: Arc::new(decoder),
            encoder: Arc::new(encoder),
            parent_finder: Arc::new(parent_finder),
        }
    }

    pub fn parent(&self) -> &Arc<N> {
        &self.parent
    }
}

impl<N, C, P> ChannelContext for ChildContext<N, C, P>
where
    N: ChannelContext,
    C: 'static,
    P: Send + 'static,
{
    type Context = C;
    type Payload = (N::Payload, P);

    fn decode_payload(&self, buf: &mut NetBuf) -> BufResult<Self::Payload> {
        let parent = self.parent.decode_payload(buf)?;
        let own = self.codec.decode(buf)?;
        Ok((parent, own))
    }

    fn encode_payload(&self, payload: &Self::Payload, buf: &mut NetBuf) -> BufResult<()> {
        self.parent.encode_payload(&payload.0, buf)?;
        self.codec.encode(buf, &payload.1)
    }

    fn decode_context(&self, payload: &Self::Payload, ctx: &HandlingContext) -> HandlingResult<C> {
        let parent = self.parent.decode_context(&payload.0, ctx)?;
        (self.decoder)(&parent, &payload.1, ctx)
    }

    fn encode_context(&self, context: &C) -> Self::Payload {
        let parent = (self.parent_finder)(context);
        (self.parent.encode_context(&parent), (self.encoder)(context))
    }
}

impl<N: ChannelContext, C, P> fmt::Debug for ChildContext<N, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildContext")
            .field("context", &std::any::type_name::<C>())
            .field("parent", &std::any::type_name::<N>())
            .field("codec", &self.codec)
            .finish()
    }
}
