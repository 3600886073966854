use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use ctxnet_buf::{Identifier, NetBuf};
use tracing::{debug, error};

use crate::channel::Channel;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::handling::{Direction, HandlingContext};
use crate::transport::{Receiver, Registrar};

/// Name-keyed set of channels, installed into a transport in one step.
pub struct ChannelRegistry {
    channels: BTreeMap<Identifier, Arc<dyn Channel>>,
    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a channel, returning a shared handle for sending.
    pub fn register<C: Channel + 'static>(
        &mut self,
        channel: C,
    ) -> Result<Arc<C>, RegistryError> {
        let channel = Arc::new(channel);
        self.register_shared(Arc::clone(&channel) as Arc<dyn Channel>)?;
        Ok(channel)
    }

    /// Register a channel that is already shared.
    pub fn register_shared(&mut self, channel: Arc<dyn Channel>) -> Result<(), RegistryError> {
        let name = channel.name().clone();
        if self.channels.contains_key(&name) {
            return Err(RegistryError::DuplicateChannel(name));
        }
        self.channels.insert(name, channel);
        Ok(())
    }

    pub fn get(&self, name: &Identifier) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// Registered channels in name order.
    pub fn channels(&self) -> impl Iterator<Item = &Arc<dyn Channel>> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Subscribe every channel with the registrar, in each direction it
    /// has a handler for. Returns the number of subscriptions made.
    pub fn install(&self, registrar: &mut dyn Registrar) -> usize {
        let mut installed = 0;
        for channel in self.channels.values() {
            for direction in [Direction::ToClient, Direction::ToServer] {
                if !channel.handles(direction) {
                    continue;
                }
                let receiver =
                    bounded_receiver(Arc::clone(channel), direction, self.config.max_payload_size);
                registrar.register_receiver(channel.name().clone(), direction, receiver);
                installed += 1;
            }
            debug!(
                channel = %channel.name(),
                to_client = channel.is_to_client(),
                to_server = channel.is_to_server(),
                "installed channel"
            );
        }
        installed
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn bounded_receiver(
    channel: Arc<dyn Channel>,
    direction: Direction,
    max_payload: usize,
) -> Receiver {
    Arc::new(move |payload: Bytes, ctx: HandlingContext| {
        if payload.len() > max_payload {
            error!(
                channel = %channel.name(),
                %direction,
                size = payload.len(),
                max = max_payload,
                "dropping oversized payload"
            );
            return;
        }
        let mut buf = NetBuf::from_bytes_with_config(&payload, *channel.buf_config());
        channel.receive(direction, &mut buf, ctx);
    })
}
