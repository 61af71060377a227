//! Device SDK abstraction
//!
//! Traits for the external discovery / status collaborator, supporting the
//! simulated implementation and test doubles.

use std::future::Future;
use std::time::Duration;

use crate::{ContractError, DeviceInfo, DeviceStatus, EventSample, GazeSample, RawComponent};

/// Network discovery
pub trait DeviceNetwork: Send + Sync {
    /// Enumerate devices reachable on the local network
    ///
    /// Waits at most `timeout`; an empty list is a valid result.
    fn discover(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<DeviceInfo>, ContractError>> + Send;
}

/// Decoded gaze stream opened from a sensor url
#[trait_variant::make(GazeReceiver: Send)]
pub trait LocalGazeReceiver {
    /// Next sample, `Ok(None)` once the stream ended
    async fn next_gaze(&mut self) -> Result<Option<GazeSample>, ContractError>;
}

/// Push notifications of status changes
#[trait_variant::make(StatusFeed: Send)]
pub trait LocalStatusFeed {
    /// Next changed component, `None` once updates were stopped
    async fn next_update(&mut self) -> Option<RawComponent>;
}

/// Connection to one device
pub trait DeviceClient: Send + Sync + 'static {
    type Gaze: GazeReceiver + 'static;
    type Feed: StatusFeed + 'static;

    /// Request a full status snapshot
    fn get_status(&self) -> impl Future<Output = Result<DeviceStatus, ContractError>> + Send;

    /// Start receiving status updates
    fn receive_updates_start(&self) -> impl Future<Output = Result<Self::Feed, ContractError>> + Send;

    /// Stop receiving status updates; open feeds end
    fn receive_updates_stop(&self) -> impl Future<Output = Result<(), ContractError>> + Send;

    /// Open the gaze stream behind a sensor url
    fn open_gaze(&self, url: &str) -> impl Future<Output = Result<Self::Gaze, ContractError>> + Send;

    /// Send a named event, stamped by the device
    fn send_event(&self, name: &str) -> impl Future<Output = Result<EventSample, ContractError>> + Send;

    /// Close the connection
    fn close(&self) -> impl Future<Output = Result<(), ContractError>> + Send;
}
