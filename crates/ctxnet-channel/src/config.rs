use serde::{Deserialize, Serialize};

/// Default maximum inbound payload size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Controls how installed channels accept inbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Payloads larger than this are dropped before decoding.
    pub max_payload_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let cfg: RegistryConfig = serde_json::from_str(r#"{ "max_payload_size": 64 }"#).unwrap();
        assert_eq!(cfg.max_payload_size, 64);

        let cfg: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RegistryConfig::default());
    }
}
