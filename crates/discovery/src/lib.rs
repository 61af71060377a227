//! # Discovery
//!
//! Device discovery and selection.
//!
//! Responsibilities:
//! - Retry network discovery within a bounded attempt budget
//! - Interactive selection with reload and merge-by-address
//! - Direct `IP:PORT` addressing
//! - Resolve the selected device's identity from its status
//! - Simulated network/device for running without hardware

pub mod address;
pub mod coordinator;
pub mod error;
pub mod selection;
pub mod simulated;

pub use address::parse_device_address;
pub use coordinator::{resolve_device, DiscoveryCoordinator};
pub use error::{DiscoveryError, Result};
pub use selection::{DeviceSelector, ScriptedSelector, SelectionInput, StdinSelector};
pub use simulated::{SimulatedDevice, SimulatedFeed, SimulatedGaze, SimulatedNetwork};
