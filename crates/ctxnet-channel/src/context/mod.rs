//! Context nodes: translate a runtime object into a small location payload
//! and back.
//!
//! A tree of nodes is built at startup. Roots resolve an object from their
//! own payload alone; children resolve their parent first and then look up
//! their own object inside it; casts narrow the parent's object to a more
//! specific type. The payload type of a tree mirrors its shape, so a
//! depth-two tree carries `(RootPayload, ChildPayload)`.

mod builtin;
mod cast;
mod child;
mod root;

use std::sync::Arc;

use ctxnet_buf::{NetBuf, PayloadCodec, Result as BufResult};

use crate::error::HandlingResult;
use crate::handling::HandlingContext;

pub use builtin::{
    block_entity_context, entity_context, screen_context, BlockEntityWorld, EntityWorld,
    HostWorld, ScreenHandler,
};
pub use cast::CastContext;
pub use child::ChildContext;
pub use root::RootContext;

/// A node in a context tree.
pub trait ChannelContext: Send + Sync + 'static {
    /// The object a message pertains to.
    type Context: 'static;
    /// The location payload identifying that object on the wire.
    type Payload: Send + 'static;

    /// Read the location payload. Must consume exactly what
    /// [`encode_payload`](Self::encode_payload) wrote.
    fn decode_payload(&self, buf: &mut NetBuf) -> BufResult<Self::Payload>;

    fn encode_payload(&self, payload: &Self::Payload, buf: &mut NetBuf) -> BufResult<()>;

    /// Resolve the object on the receiving side.
    fn decode_context(
        &self,
        payload: &Self::Payload,
        ctx: &HandlingContext,
    ) -> HandlingResult<Self::Context>;

    /// Extract the location payload on the sending side.
    fn encode_context(&self, context: &Self::Context) -> Self::Payload;

    /// Narrow this node's objects to `T`.
    fn cast<T>(self) -> CastContext<Self, T>
    where
        Self: Sized,
        Self::Context: Narrow<T>,
        T: 'static,
    {
        CastContext::new(Arc::new(self))
    }

    /// Build a child node resolving objects that live inside this node's
    /// objects.
    ///
    /// `decoder` finds the child from the resolved parent and the child's
    /// own payload; `encoder` extracts that payload; `parent_finder` maps a
    /// child back to the parent it lives in.
    fn child<C, P>(
        self,
        codec: PayloadCodec<P>,
        decoder: impl Fn(&Self::Context, &P, &HandlingContext) -> HandlingResult<C>
            + Send
            + Sync
            + 'static,
        encoder: impl Fn(&C) -> P + Send + Sync + 'static,
        parent_finder: impl Fn(&C) -> Self::Context + Send + Sync + 'static,
    ) -> ChildContext<Self, C, P>
    where
        Self: Sized,
        C: 'static,
        P: Send + 'static,
    {
        ChildContext::new(Arc::new(self), codec, decoder, encoder, parent_finder)
    }
}

/// Checked narrowing from a general context type to a specific one.
///
/// Implemented by the host for each pair it casts between, usually by
/// matching on an enum of object kinds or downcasting a trait object.
pub trait Narrow<T>: Sized {
    /// The narrowed value, or `self` back if it is some other kind.
    fn narrow(self) -> Result<T, Self>;

    fn widen(narrowed: &T) -> Self;

    /// Human-readable name of the actual kind, used in cast failures.
    fn kind_name(&self) -> String;
}
