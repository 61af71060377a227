//! MemoryTransport - records pushes in memory

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Outlet, OutletTransport, SampleValues, SensorKind, StreamInfo};

/// One recorded push
#[derive(Debug, Clone, PartialEq)]
pub struct PushedSample {
    pub outlet: String,
    pub kind: SensorKind,
    pub values: SampleValues,
    pub timestamp: f64,
}

#[derive(Default)]
struct Recorded {
    outlets: Vec<StreamInfo>,
    pushes: Vec<PushedSample>,
}

/// Transport keeping every created outlet and push
///
/// Clones share the same record.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    clock: f64,
    recorded: Arc<Mutex<Recorded>>,
}

fn lock(recorded: &Mutex<Recorded>) -> MutexGuard<'_, Recorded> {
    recorded.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed transport clock value
    pub fn with_clock(clock: f64) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Stream descriptions of created outlets
    pub fn outlets(&self) -> Vec<StreamInfo> {
        lock(&self.recorded).outlets.clone()
    }

    pub fn pushes(&self) -> Vec<PushedSample> {
        lock(&self.recorded).pushes.clone()
    }

    pub fn pushes_of(&self, kind: SensorKind) -> Vec<PushedSample> {
        lock(&self.recorded)
            .pushes
            .iter()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect()
    }

    pub fn push_count(&self, kind: SensorKind) -> usize {
        lock(&self.recorded).pushes.iter().filter(|p| p.kind == kind).count()
    }
}

impl OutletTransport for MemoryTransport {
    type Outlet = MemoryOutlet;

    fn name(&self) -> &str {
        "memory"
    }

    fn create_outlet(&self, info: StreamInfo) -> Result<MemoryOutlet, ContractError> {
        lock(&self.recorded).outlets.push(info.clone());
        Ok(MemoryOutlet {
            info,
            recorded: Arc::clone(&self.recorded),
        })
    }

    fn local_clock(&self) -> f64 {
        self.clock
    }
}

pub struct MemoryOutlet {
    info: StreamInfo,
    recorded: Arc<Mutex<Recorded>>,
}

impl Outlet for MemoryOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, values: SampleValues, timestamp: f64) -> Result<(), ContractError> {
        lock(&self.recorded).pushes.push(PushedSample {
            outlet: self.info.name.clone(),
            kind: self.info.kind,
            values,
            timestamp,
        });
        Ok(())
    }
}
