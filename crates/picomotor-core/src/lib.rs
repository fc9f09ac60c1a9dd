//! # Picomotor Core Library
//!
//! Driver for the New Focus/Newport 8742 four channel open-loop Picomotor
//! controller.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Command formatting and the half-duplex request/response protocol
//! - One method per controller command, plus a polling wait for motion
//! - Transports over TCP, USB bulk endpoints and an in-process simulator
//! - Serde configuration selecting the transport at startup
//!
//! ## Example
//!
//! ```rust,ignore
//! use picomotor_core::config::DriverConfig;
//!
//! let mut ctrl = DriverConfig::simulated().connect().await?;
//! ctrl.set_velocity(1, 1500).await?;
//! ctrl.set_relative(1, 100).await?;
//! ctrl.finish(Some(1)).await?;
//! println!("at {}", ctrl.position(1).await?);
//! ctrl.close().await?;
//! ```

pub mod config;
pub mod protocol;
pub mod simulator;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DriverConfig, TransportConfig};
    pub use crate::protocol::{
        Channel, ChannelSettings, Command, Controller, MotorType, ProtocolError, Transport,
    };
    pub use crate::simulator::{SimulatedController, SimulatorConfig};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
