use serde::{Deserialize, Serialize};

/// Default maximum encoded packet size: 2 MiB.
pub const DEFAULT_MAX_PACKET: usize = 2 * 1024 * 1024;

/// Default number of disconnect reasons kept after peers close.
pub const DEFAULT_CLOSED_HISTORY: usize = 1024;

/// Configuration for a loopback network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Largest encoded packet accepted for sending.
    pub max_packet_size: usize,
    /// Prefix for I/O thread names.
    pub thread_name: String,
    /// How many disconnect reasons to remember; older ones are dropped.
    pub closed_history: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET,
            thread_name: "ctxnet-loopback".to_string(),
            closed_history: DEFAULT_CLOSED_HISTORY,
        }
    }
}
