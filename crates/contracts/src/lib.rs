//! # Contracts
//!
//! Frozen interface contracts shared by the relay, discovery and alignment crates.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Device samples carry Unix time in seconds (`f64`), events arrive in nanoseconds
//! - Outlets publish in the transport clock domain (`Outlet::push` timestamp)
//! - The relay owns the single additive correction between the two

mod client;
mod device;
mod error;
mod outlet;
mod relay_config;
mod sensor;

pub use client::{DeviceClient, DeviceNetwork, GazeReceiver, StatusFeed};
pub use device::*;
pub use error::*;
pub use outlet::*;
pub use relay_config::*;
pub use sensor::*;
