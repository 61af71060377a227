//! # Time Align
//!
//! Post-hoc alignment of a stream capture (XDF) with cloud exports.
//!
//! Responsibilities:
//! - Read capture event streams and export event/gaze tables
//! - Match sessions by camera serial or time-sync session id
//! - Fit affine clock mappings in both directions
//! - Write mapping parameters and capture-time annotated gaze

pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod model;
pub mod output;
pub mod session;
pub mod xdf;

pub use engine::{align_events, AlignedSession, AlignmentEngine, AlignmentOutput, AlignmentReport, ClockMapping};
pub use error::{AlignmentError, Result, XdfError};
pub use events::{filter_common, name_intersection, EventLog, EventRecord};
pub use export::{discover_exports, CloudExport, GazeTable};
pub use model::{AffineClockModel, FitError};
pub use output::write_alignment;
pub use session::{session_id_from_events, MatchStrategy, SessionKey};
pub use xdf::{read_xdf, XdfChannelFormat, XdfFile, XdfStream, XdfStreamHeader, XdfWriter};
