//! Driver configuration
//!
//! Selects which transport to open and how. Configurations are plain serde
//! structs with defaults, so a JSON file only needs the fields it changes:
//!
//! ```json
//! { "transport": { "kind": "stream", "host": "8742-37565" } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::protocol::{
    stream, usb, Controller, ProtocolError, StreamTransport, Transport, UsbTransport,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::simulator::{SimulatedController, SimulatorConfig};

/// Errors loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which transport to use and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// In-process simulated controller
    Simulated(SimulatorConfig),
    /// TCP connection to the controller's Ethernet port
    Stream {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
    },
    /// USB bulk endpoints
    Usb {
        #[serde(default = "default_vendor_id")]
        vendor_id: u16,
        #[serde(default = "default_product_id")]
        product_id: u16,
        #[serde(default = "default_usb_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_port() -> u16 {
    stream::DEFAULT_PORT
}

fn default_vendor_id() -> u16 {
    usb::DEFAULT_VENDOR_ID
}

fn default_product_id() -> u16 {
    usb::DEFAULT_PRODUCT_ID
}

fn default_usb_timeout_ms() -> u64 {
    usb::DEFAULT_TIMEOUT_MS
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Usb {
            vendor_id: usb::DEFAULT_VENDOR_ID,
            product_id: usb::DEFAULT_PRODUCT_ID,
            timeout_ms: usb::DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Open the configured transport
    pub async fn connect(&self) -> Result<Box<dyn Transport>, ProtocolError> {
        match self {
            TransportConfig::Simulated(sim) => {
                info!("Using simulated controller");
                Ok(Box::new(SimulatedController::connect(sim).await?))
            }
            TransportConfig::Stream { host, port } => {
                info!("Connecting to controller at {}:{}", host, port);
                Ok(Box::new(StreamTransport::connect(host, *port).await?))
            }
            TransportConfig::Usb {
                vendor_id,
                product_id,
                timeout_ms,
            } => {
                info!("Opening USB controller {:04x}:{:04x}", vendor_id, product_id);
                let timeout = Duration::from_millis(*timeout_ms);
                Ok(Box::new(UsbTransport::open(*vendor_id, *product_id, timeout)?))
            }
        }
    }
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub transport: TransportConfig,
    /// Interval between motion-done polls in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DriverConfig {
    /// Configuration using the simulated controller
    pub fn simulated() -> Self {
        Self {
            transport: TransportConfig::Simulated(SimulatorConfig::default()),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Open the transport and wrap it in a [`Controller`]
    pub async fn connect(&self) -> Result<Controller, ProtocolError> {
        let transport = self.transport.connect().await?;
        Ok(Controller::new(transport)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_usb() {
        let config = DriverConfig::default();
        assert_eq!(
            config.transport,
            TransportConfig::Usb {
                vendor_id: 0x104d,
                product_id: 0x4000,
                timeout_ms: 1000,
            }
        );
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn test_stream_port_defaults_to_telnet() {
        let config: DriverConfig =
            serde_json::from_str(r#"{ "transport": { "kind": "stream", "host": "8742-37565" } }"#)
                .unwrap();
        assert_eq!(
            config.transport,
            TransportConfig::Stream {
                host: "8742-37565".to_string(),
                port: 23,
            }
        );
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn test_simulated_settings() {
        let config: DriverConfig = serde_json::from_str(
            r#"{ "transport": { "kind": "simulated", "seed": 3 }, "poll_interval_ms": 1 }"#,
        )
        .unwrap();
        assert_eq!(
            config.transport,
            TransportConfig::Simulated(SimulatorConfig {
                done_probability: 0.5,
                seed: Some(3),
            })
        );
        assert_eq!(config.poll_interval_ms, 1);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<DriverConfig, _> =
            serde_json::from_str(r#"{ "transport": { "kind": "serial" } }"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_simulated() {
        let mut ctrl = DriverConfig::simulated().connect().await.unwrap();
        assert_eq!(ctrl.poll_interval(), Duration::from_millis(10));
        assert_eq!(ctrl.identify().await.unwrap(), crate::simulator::IDENTIFICATION);
        ctrl.close().await.unwrap();
    }
}
