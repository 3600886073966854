use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ctxnet_buf::{NetBuf, Result as BufResult};

use super::{ChannelContext, Narrow};
use crate::error::{HandlingError, HandlingResult};
use crate::handling::HandlingContext;

/// A node that narrows its parent's objects to `T`.
///
/// Shares the parent's location payload; only resolution differs.
pub struct CastContext<N, T> {
    parent: Arc<N>,
    _narrowed: PhantomData<fn() -> T>,
}

impl<N, T> CastContext<N, T> {
    pub fn new(parent: Arc<N>) -> Self {
        Self {
            parent,
            _narrowed: PhantomData,
        }
    }

    pub fn parent(&self) -> &Arc<N> {
        &self.parent
    }
}

impl<N, T> ChannelContext for CastContext<N, T>
where
    N: ChannelContext,
    N::Context: Narrow<T>,
    T: 'static,
{
    type Context = T;
    type Payload = N::Payload;

    fn decode_payload(&self, buf: &mut NetBuf) -> BufResult<N::Payload> {
        self.parent.decode_payload(buf)
    }

    fn encode_payload(&self, payload: &N::Payload, buf: &mut NetBuf) -> BufResult<()> {
        self.parent.encode_payload(payload, buf)
    }

    fn decode_context(&self, payload: &N::Payload, ctx: &HandlingContext) -> HandlingResult<T> {
        let parent = self.parent.decode_context(payload, ctx)?;
        parent.narrow().map_err(|actual| {
            HandlingError::resolution(format!(
                "expected {} but found {}",
                std::any::type_name::<T>(),
                actual.kind_name()
            ))
        })
    }

    fn encode_context(&self, context: &T) -> N::Payload {
        self.parent
            .encode_context(&<N::Context as Narrow<T>>::widen(context))
    }
}

impl<N, T> Clone for CastContext<N, T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.parent))
    }
}

impl<N, T> fmt::Debug for CastContext<N, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastContext")
            .field("to", &std::any::type_name::<T>())
            .field("parent", &std::any::type_name::<N>())
            .finish()
    }
}
