//! Alignment error types

use std::path::PathBuf;

use thiserror::Error;

/// Post-hoc alignment error
#[derive(Debug, Error)]
pub enum AlignmentError {
    /// Capture file could not be decoded
    #[error("invalid capture file {}: {source}", path.display())]
    InvalidCapture {
        path: PathBuf,
        #[source]
        source: XdfError,
    },

    /// Capture holds no event stream usable for alignment
    #[error("capture file {} does not contain any valid event streams", path.display())]
    NoCaptureStreams { path: PathBuf },

    /// Expected exactly one file of this name below an export directory
    #[error("expected exactly one '{file}' below {}, found {found}", dir.display())]
    FileCount {
        dir: PathBuf,
        file: String,
        found: usize,
    },

    /// Export file content is unusable
    #[error("invalid export file {}: {message}", path.display())]
    InvalidExport { path: PathBuf, message: String },

    /// No event name is present in both logs
    #[error("no matching events for session '{session}'")]
    NoMatchingEvents { session: String },

    /// Matched events differ in count between the logs
    #[error("session '{session}': {capture} matched capture events vs {export} matched export events")]
    MatchedCountMismatch {
        session: String,
        capture: usize,
        export: usize,
    },

    /// Regression is not identifiable
    #[error("degenerate fit for session '{session}': {message}")]
    DegenerateFit { session: String, message: String },

    /// No export matched any capture stream
    #[error("no valid exports found for the capture streams")]
    NoValidExports,

    /// Some sessions could not be aligned
    #[error("{failed} of {total} sessions failed to align")]
    SessionsFailed { failed: usize, total: usize },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignmentError {
    pub fn invalid_capture(path: impl Into<PathBuf>, source: impl Into<XdfError>) -> Self {
        Self::InvalidCapture {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn invalid_export(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidExport {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn degenerate_fit(session: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DegenerateFit {
            session: session.into(),
            message: message.into(),
        }
    }
}

/// XDF decoding error
#[derive(Debug, Error)]
pub enum XdfError {
    #[error("missing XDF magic")]
    MissingMagic,

    #[error("invalid length width {0}")]
    LengthWidth(u8),

    #[error("invalid timestamp width {0}")]
    TimestampWidth(u8),

    #[error("truncated chunk (tag {tag})")]
    TruncatedChunk { tag: u16 },

    #[error("chunk too large")]
    ChunkTooLarge,

    #[error("string exceeds chunk")]
    StringOverflow,

    #[error("string channel read as numeric")]
    StringAsNumeric,

    #[error("stream header without {0}")]
    MissingField(&'static str),

    #[error("unknown channel format '{0}'")]
    UnknownChannelFormat(String),

    #[error("invalid {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("unknown entity '&{0};'")]
    UnknownEntity(String),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error inside the chunks of one stream
    #[error("stream {id}: {source}")]
    Stream {
        id: u32,
        #[source]
        source: Box<XdfError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl XdfError {
    pub fn in_stream(self, id: u32) -> Self {
        Self::Stream {
            id,
            source: Box::new(self),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, AlignmentError>;
