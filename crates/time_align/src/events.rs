//! Named event logs and their common-name filtering

use std::collections::{BTreeSet, HashMap, VecDeque};

/// One named event, seconds in the log's own clock
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub name: String,
    pub timestamp: f64,
}

/// Ordered event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    /// Build from nanosecond timestamps
    pub fn from_nanos<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        events
            .into_iter()
            .map(|(name, ns)| EventRecord {
                name: name.into(),
                timestamp: ns as f64 * 1e-9,
            })
            .collect()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    /// Rows whose name is in `names`, order preserved
    pub fn retain_names(&self, names: &BTreeSet<String>) -> Self {
        self.records
            .iter()
            .filter(|r| names.contains(&r.name))
            .cloned()
            .collect()
    }
}

impl FromIterator<EventRecord> for EventLog {
    fn from_iter<T: IntoIterator<Item = EventRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Names present in both logs
pub fn name_intersection(a: &EventLog, b: &EventLog) -> BTreeSet<String> {
    let left: BTreeSet<&str> = a.names().collect();
    b.names()
        .filter(|name| left.contains(name))
        .map(str::to_string)
        .collect()
}

/// Both logs reduced to their common names
pub fn filter_common(a: &EventLog, b: &EventLog) -> (EventLog, EventLog) {
    let common = name_intersection(a, b);
    (a.retain_names(&common), b.retain_names(&common))
}

/// Filtered logs whose row counts differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    pub left: usize,
    pub right: usize,
}

/// Timestamp pairs of equally named events
///
/// The k-th occurrence of a name in `a` pairs with its k-th occurrence in
/// `b`; pairs follow the order of `a`. Both logs must already be filtered
/// to their common names.
pub fn pair_by_name(a: &EventLog, b: &EventLog) -> Result<Vec<(f64, f64)>, CountMismatch> {
    if a.len() != b.len() {
        return Err(CountMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut occurrences: HashMap<&str, VecDeque<f64>> = HashMap::new();
    for record in &b.records {
        occurrences.entry(record.name.as_str()).or_default().push_back(record.timestamp);
    }

    let mut pairs = Vec::with_capacity(a.len());
    for record in &a.records {
        let right = occurrences
            .get_mut(record.name.as_str())
            .and_then(|queue| queue.pop_front())
            .ok_or(CountMismatch {
                left: a.len(),
                right: b.len(),
            })?;
        pairs.push((record.timestamp, right));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(names: &[&str]) -> EventLog {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| EventRecord {
                name: n.to_string(),
                timestamp: i as f64,
            })
            .collect()
    }

    #[test]
    fn test_intersection_commutative() {
        let a = log(&["begin", "sync.0", "only_a", "sync.1"]);
        let b = log(&["sync.1", "only_b", "begin", "sync.0"]);
        assert_eq!(name_intersection(&a, &b), name_intersection(&b, &a));
        assert_eq!(name_intersection(&a, &b).len(), 3);
    }

    #[test]
    fn test_filter_preserves_order_and_count() {
        let a = log(&["x", "begin", "sync.0", "y"]);
        let b = log(&["sync.0", "z", "begin"]);
        let (fa, fb) = filter_common(&a, &b);

        assert_eq!(fa.names().collect::<Vec<_>>(), ["begin", "sync.0"]);
        assert_eq!(fb.names().collect::<Vec<_>>(), ["sync.0", "begin"]);
        assert_eq!(fa.len(), name_intersection(&a, &b).len());
        assert_eq!(fa.timestamps(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_pair_by_name_ignores_order() {
        let a = log(&["begin", "sync.0"]);
        let b = log(&["sync.0", "begin"]);
        assert_eq!(pair_by_name(&a, &b).unwrap(), vec![(0.0, 1.0), (1.0, 0.0)]);
    }

    #[test]
    fn test_pair_by_name_count_mismatch() {
        let a = log(&["begin", "begin"]);
        let b = log(&["begin"]);
        assert_eq!(pair_by_name(&a, &b), Err(CountMismatch { left: 2, right: 1 }));

        let a = log(&["begin", "begin"]);
        let b = log(&["begin", "end"]);
        assert!(pair_by_name(&a, &b).is_err());
    }

    #[test]
    fn test_from_nanos() {
        let log = EventLog::from_nanos([("a", 1_000_000_000i64), ("b", 2_500_000_000)]);
        assert_eq!(log.timestamps(), vec![1.0, 2.5]);
    }
}
