use serde::{Deserialize, Serialize};

/// Default initial capacity for newly created buffers.
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// Default maximum string length in bytes.
pub const DEFAULT_MAX_STRING_LEN: usize = 32767;

/// Configuration for a [`NetBuf`](crate::NetBuf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufConfig {
    /// Disable bit packing and compact varints, falling back to naive
    /// fixed-width encodings.
    pub passthrough: bool,
    /// Initial byte capacity reserved for writing.
    pub initial_capacity: usize,
    /// Maximum encoded string length accepted on write and read.
    pub max_string_len: usize,
}

impl BufConfig {
    /// Default configuration with passthrough enabled.
    pub fn passthrough() -> Self {
        Self {
            passthrough: true,
            ..Self::default()
        }
    }
}

impl Default for BufConfig {
    fn default() -> Self {
        Self {
            passthrough: false,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}
