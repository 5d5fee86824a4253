//! Backend connection settings

use serde::{Deserialize, Serialize};

/// Which OSC dialect the renderer speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscFlavor {
    /// One port, channel encoded in the address
    #[default]
    Addressed,
    /// One port per channel starting at `port`
    PortOffset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    /// Target port (base port for [`OscFlavor::PortOffset`])
    pub port: u16,
    pub flavor: OscFlavor,
    /// First address segment, without slashes
    pub address_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            flavor: OscFlavor::Addressed,
            address_prefix: "orbit".to_string(),
        }
    }
}
