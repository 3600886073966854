//! Typed, context-resolving network channels for client/server hosts.
//!
//! ctxnet lets application code define named channels whose messages are
//! about some runtime object, such as a particular block entity, that
//! exists separately on each side of a connection. The sender encodes a
//! small location for the object; the receiver resolves it again on its
//! own main loop before the handler runs.
//!
//! # Crate Structure
//!
//! - [`buf`]: Compact binary buffer, payload codecs and palettes
//! - [`channel`]: Context trees, channels, handling policies and the transport seam
//! - [`loopback`]: In-process transport for tests and demos (behind `loopback` feature)

/// Re-export buffer types.
pub mod buf {
    pub use ctxnet_buf::*;
}

/// Re-export channel types.
pub mod channel {
    pub use ctxnet_channel::*;
}

/// Re-export loopback transport types (requires `loopback` feature).
#[cfg(feature = "loopback")]
pub mod loopback {
    pub use ctxnet_loopback::*;
}
