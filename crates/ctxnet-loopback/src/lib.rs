//! In-process transport for ctxnet channels.
//!
//! A [`LoopbackNetwork`] is a server endpoint; [`LoopbackNetwork::connect`]
//! adds [`ClientEndpoint`]s. Every endpoint has its own I/O thread, which
//! decodes inbound packets and hands them to the receivers a
//! [`ChannelRegistry`](ctxnet_channel::ChannelRegistry) installed, and its
//! own main-loop queue, drained by the owner with `run_pending` or
//! `run_next`. The layout mirrors a real client/server split closely enough
//! to exercise channel threading and routing in tests.

pub mod client;
pub mod config;
mod hub;
mod io;
mod routing;
pub mod server;

pub use client::ClientEndpoint;
pub use config::{LoopbackConfig, DEFAULT_CLOSED_HISTORY, DEFAULT_MAX_PACKET};
pub use server::LoopbackNetwork;
