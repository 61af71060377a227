//! # Relay
//!
//! Live gaze and event relay from one device to two outlets.
//!
//! Responsibilities:
//! - Track the gaze sensor connection and debounce disconnects
//! - Receive gaze samples and queue them per kind
//! - Publish with clock-offset corrected timestamps
//! - Emit periodic time-sync events for post-hoc alignment
//! - Supervise all tasks with first-completion cleanup

pub mod clock;
pub mod error;
pub mod outlets;
pub mod queue;
pub mod session;
pub mod stream;
pub mod supervisor;
pub mod tasks;
pub mod time_sync;
pub mod transport;

pub use clock::{unix_now, ClockOffset};
pub use error::{RelayError, Result};
pub use outlets::{event_stream_info, gaze_stream_info, ChannelStats, OutputChannel};
pub use queue::{sample_queue, Dequeue, QueueReceiver, QueueSender};
pub use session::{RelaySession, RelaySettings, SessionSummary};
pub use supervisor::{
    transition, Action, ConnectionSupervisor, SensorEvent, SensorState, SessionTeardown, TeardownReason,
};
pub use tasks::{SupervisionReport, TaskHandle, TaskOutcome, TaskSet};
pub use time_sync::{time_sync_event_name, TIME_SYNC_PREFIX};
pub use transport::{AnyOutlet, AnyTransport, MemoryTransport};
