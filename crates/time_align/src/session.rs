//! Session keys and matching strategy

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::events::EventLog;

/// How capture streams and exports are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// World camera serial number
    #[default]
    Serial,
    /// Session uuid embedded in time-sync event names
    Session,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Session => "session",
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(Self::Serial),
            "session" => Ok(Self::Session),
            other => Err(format!("unknown match strategy '{other}' (expected serial|session)")),
        }
    }
}

/// Identifier shared by a capture stream and an export
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    Serial(String),
    Session(Uuid),
}

impl SessionKey {
    /// Name usable as an output directory
    pub fn dir_name(&self) -> String {
        match self {
            Self::Serial(serial) => {
                let safe: String = serial
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                    .collect();
                format!("serial_{safe}")
            }
            Self::Session(id) => format!("session_{id}"),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(serial) => write!(f, "serial {serial}"),
            Self::Session(id) => write!(f, "session {id}"),
        }
    }
}

fn time_sync_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"lsl\.time_sync\.([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\.\d+").ok()
        })
        .as_ref()
}

/// Session uuid of the first time-sync event name
pub fn session_id_from_name(name: &str) -> Option<Uuid> {
    let captures = time_sync_pattern()?.captures(name)?;
    Uuid::parse_str(captures.get(1)?.as_str()).ok()
}

/// Session uuid of the first matching event in the log
pub fn session_id_from_events(log: &EventLog) -> Option<Uuid> {
    log.names().find_map(session_id_from_name)
}
