//! Typed channels for ctxnet.
//!
//! A channel pairs a stable name with a data codec and, for
//! [`ContextualChannel`], a context tree that turns the object a message is
//! about into a small location payload and back. Transports hand inbound
//! bytes to [`Channel::receive`]; decoding happens on the calling thread,
//! while context resolution and handlers run on the [`HandlingContext`]'s
//! executor. Handler failures are mapped to exactly one
//! [`HandlingPolicy`] at that boundary.
//!
//! ```
//! use ctxnet_buf::{Identifier, PayloadCodec};
//! use ctxnet_channel::{Channel, HandlingError, NoContextChannel};
//!
//! let name = Identifier::parse("demo:chat").unwrap();
//! let codec = PayloadCodec::new(|buf, s: &String| buf.write_string(s), |buf| buf.read_string());
//! let chat = NoContextChannel::new(name, codec).recv_sync_server(|msg, _ctx| {
//!     if msg.is_empty() {
//!         return Err(HandlingError::silent());
//!     }
//!     Ok(())
//! });
//! assert!(chat.is_to_server());
//! ```

pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod handling;
pub mod ids;
pub mod registry;
pub mod transport;

pub use channel::{error_chain, Channel, ContextualChannel, NoContextChannel};
pub use config::{RegistryConfig, DEFAULT_MAX_PAYLOAD};
pub use context::{
    block_entity_context, entity_context, screen_context, BlockEntityWorld, CastContext,
    ChannelContext, ChildContext, EntityWorld, HostWorld, Narrow, RootContext, ScreenHandler,
};
pub use error::{
    BoxError, ChannelError, HandlingError, HandlingPolicy, HandlingResult, RegistryError, Result,
    TransportError,
};
pub use executor::{Executor, ImmediateExecutor, Task, TaskQueue};
pub use handling::{Direction, HandlingContext, OpenScreen, Participant, WorldHandle};
pub use ids::{EntityId, PartitionId, PeerId};
pub use registry::ChannelRegistry;
pub use transport::{decode_packet, encode_packet, Packet, PlatformTransport, Receiver, Registrar, Target};
