use std::fmt;
use std::sync::Arc;

use ctxnet_buf::{NetBuf, PayloadCodec, Result as BufResult};

use super::ChannelContext;
use crate::error::HandlingResult;
use crate::handling::HandlingContext;

type RootDecoder<C, P> = dyn Fn(&P, &HandlingContext) -> HandlingResult<C> + Send + Sync;
type RootEncoder<C, P> = dyn Fn(&C) -> P + Send + Sync;

/// A node that resolves its object from its own payload and the handling
/// context alone.
pub struct RootContext<C, P> {
    codec: PayloadCodec<P>,
    decoder: Arc<RootDecoder<C, P>>,
    encoder: Arc<RootEncoder<C, P>>,
}

impl<C, P> RootContext<C, P> {
    pub fn new(
        codec: PayloadCodec<P>,
        decoder: impl Fn(&P, &HandlingContext) -> HandlingResult<C> + Send + Sync + 'static,
        encoder: impl Fn(&C) -> P + Send + Sync + 'static,
    ) -> Self {
        Self {
            codec,
            decoder: Arc::new(decoder),
            encoder: Arc::new(encoder),
        }
    }
}

impl<C: 'static, P: Send + 'static> ChannelContext for RootContext<C, P> {
    type Context = C;
    type Payload = P;

    fn decode_payload(&self, buf: &mut NetBuf) -> BufResult<P> {
        self.codec.decode(buf)
    }

    fn encode_payload(&self, payload: &P, buf: &mut NetBuf) -> BufResult<()> {
        self.codec.encode(buf, payload)
    }

    fn decode_context(&self, payload: &P, ctx: &HandlingContext) -> HandlingResult<C> {
        (self.decoder)(payload, ctx)
    }

    fn encode_context(&self, context: &C) -> P {
        (self.encoder)(context)
    }
}

impl<C, P> Clone for RootContext<C, P> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            decoder: Arc::clone(&self.decoder),
            encoder: Arc::clone(&self.encoder),
        }
    }
}

impl<C, P> fmt::Debug for RootContext<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContext")
            .field("context", &std::any::type_name::<C>())
            .field("codec", &self.codec)
            .finish()
    }
}
