//! Interactive device selection
//!
//! The prompt shows the candidate table and reads one line. An index selects,
//! an empty line reloads, anything else re-prompts without a new search.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::future::Future;
use std::io::{BufRead, Write as _};

use contracts::DeviceInfo;
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// Reloads after which the prompt hints about network / app version
pub const RELOAD_HINT_THRESHOLD: usize = 5;

/// Interpreted selection input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionInput {
    /// Valid index into the candidate list
    Select(usize),
    /// Empty input: run a fresh discovery pass
    Reload,
    /// Non-numeric or out-of-range input
    Rejected(String),
}

/// Interpret one line of user input against `candidate_count` devices
pub fn evaluate_input(input: &str, candidate_count: usize) -> SelectionInput {
    let input = input.trim();
    if input.is_empty() {
        return SelectionInput::Reload;
    }
    match input.parse::<usize>() {
        Ok(index) if index < candidate_count => SelectionInput::Select(index),
        Ok(index) => SelectionInput::Rejected(format!(
            "index {index} is out of range, choose an index from the list"
        )),
        Err(_) => SelectionInput::Rejected(format!("'{input}' is not an index")),
    }
}

/// Merge a fresh discovery pass into the known candidates
///
/// Known devices keep their position and take the fresh record, new devices
/// are appended. Devices missing from the fresh pass are kept.
pub fn merge_by_address(known: &mut Vec<DeviceInfo>, fresh: Vec<DeviceInfo>) {
    for device in fresh {
        match known.iter_mut().find(|k| k.address() == device.address() && k.port == device.port) {
            Some(existing) => *existing = device,
            None => known.push(device),
        }
    }
}

/// Render the candidate table
pub fn render_device_list(candidates: &[DeviceInfo], reloads: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAvailable devices");
    let _ = writeln!(out, "{:<6} {:<24} Name", "Index", "Address");
    for (index, device) in candidates.iter().enumerate() {
        let address = format!("{}:{}", device.address().unwrap_or("?"), device.port);
        let _ = writeln!(out, "{:<6} {:<24} {}", index, address, device.display_name());
    }
    let _ = writeln!(out, " Select: enter index and hit enter");
    let _ = writeln!(out, " Reload: hit enter without input");
    let _ = writeln!(out, "  Abort: ctrl+c");
    if reloads >= RELOAD_HINT_THRESHOLD {
        let _ = writeln!(
            out,
            "Can't find the device you're looking for?\n\
             Make sure the Companion App is connected to the same network and at least version v1.4.14."
        );
    }
    out
}

/// Source of selection input
pub trait DeviceSelector: Send {
    /// Present candidates and read one line, `None` when input is closed
    fn prompt(
        &mut self,
        candidates: &[DeviceInfo],
        reloads: usize,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Reads selections from stdin on the blocking pool
#[derive(Debug, Default)]
pub struct StdinSelector;

impl DeviceSelector for StdinSelector {
    async fn prompt(&mut self, candidates: &[DeviceInfo], reloads: usize) -> Result<Option<String>> {
        let table = render_device_list(candidates, reloads);
        let line = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
            let mut stdout = std::io::stdout();
            write!(stdout, "{table}>>> ")?;
            stdout.flush()?;
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })
        .await
        .map_err(|_| DiscoveryError::SelectionAborted)??;
        Ok(line)
    }
}

/// Replays a fixed sequence of inputs
#[derive(Debug, Default)]
pub struct ScriptedSelector {
    inputs: VecDeque<String>,
    prompts: usize,
}

impl ScriptedSelector {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            prompts: 0,
        }
    }

    /// Number of prompts shown so far
    pub fn prompts(&self) -> usize {
        self.prompts
    }
}

impl DeviceSelector for ScriptedSelector {
    async fn prompt(&mut self, candidates: &[DeviceInfo], reloads: usize) -> Result<Option<String>> {
        self.prompts += 1;
        debug!(candidates = candidates.len(), reloads, "scripted prompt");
        Ok(self.inputs.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: &str, name: &str) -> DeviceInfo {
        DeviceInfo {
            name: format!("PI monitor:{name}:id._http._tcp.local."),
            addresses: vec![address.into()],
            port: 8080,
        }
    }

    #[test]
    fn test_evaluate_input() {
        assert_eq!(evaluate_input("1\n", 2), SelectionInput::Select(1));
        assert_eq!(evaluate_input("  ", 2), SelectionInput::Reload);
        assert!(matches!(evaluate_input("2", 2), SelectionInput::Rejected(_)));
        assert!(matches!(evaluate_input("abc", 2), SelectionInput::Rejected(_)));
        assert!(matches!(evaluate_input("-1", 2), SelectionInput::Rejected(_)));
    }

    #[test]
    fn test_merge_keeps_order_and_appends() {
        let mut known = vec![device("10.0.0.1", "A"), device("10.0.0.2", "B")];
        merge_by_address(
            &mut known,
            vec![device("10.0.0.3", "C"), device("10.0.0.1", "A2")],
        );
        let names: Vec<_> = known.iter().map(|d| d.display_name()).collect();
        assert_eq!(names, vec!["A2", "B", "C"]);
    }

    #[test]
    fn test_hint_after_reloads() {
        let candidates = vec![device("10.0.0.1", "A")];
        assert!(!render_device_list(&candidates, 4).contains("Can't find"));
        assert!(render_device_list(&candidates, 5).contains("Can't find"));
        assert!(render_device_list(&candidates, 0).contains("10.0.0.1:8080"));
    }
}
