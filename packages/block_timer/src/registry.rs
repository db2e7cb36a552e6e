//! Named timers accumulated per label.

use std::time::Duration;

use foldhash::{HashMap, HashMapExt};

use crate::report::ReportEntry;
use crate::{Clock, SourceLocation, Timestamp, UsageError};

/// Accumulated statistics of one label.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimerStats {
    accumulated: Duration,
    invocation_count: u64,
}

impl TimerStats {
    /// Total time across all completed start/stop pairs. Intervals still running are not
    /// included.
    #[must_use]
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Number of completed start/stop pairs.
    #[must_use]
    pub fn invocation_count(&self) -> u64 {
        self.invocation_count
    }
}

/// Read-only view of every known label, in the order labels were first started or declared.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    timers: Vec<(String, TimerStats)>,
}

impl Snapshot {
    /// Returns the statistics of a label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&TimerStats> {
        self.timers
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, stats)| stats)
    }

    /// Returns the labels and their statistics in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimerStats)> {
        self.timers.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    /// Number of known labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no label is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[derive(Debug)]
struct TimerEntry {
    label: String,
    pending: Option<Timestamp>,
    stats: TimerStats,
    location: SourceLocation,
}

/// Maps labels to their timer entries, remembering the order labels first appeared in.
#[derive(Debug)]
pub(crate) struct TimerRegistry {
    entries: Vec<TimerEntry>,
    index: HashMap<String, usize>,
}

impl TimerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn entry_mut(&mut self, label: &str, location: SourceLocation) -> &mut TimerEntry {
        let position = match self.index.get(label) {
            Some(&position) => position,
            None => {
                let position = self.entries.len();
                self.entries.push(TimerEntry {
                    label: label.to_owned(),
                    pending: None,
                    stats: TimerStats::default(),
                    location,
                });
                self.index.insert(label.to_owned(), position);
                position
            }
        };

        self.entries
            .get_mut(position)
            .expect("index only holds positions of existing entries")
    }

    /// Registers a label without starting it. Known labels are left untouched.
    pub(crate) fn declare(&mut self, label: &str, location: SourceLocation) {
        self.entry_mut(label, location);
    }

    /// Records `now` as the pending start of `label`.
    pub(crate) fn start(
        &mut self,
        label: &str,
        now: Timestamp,
        location: SourceLocation,
    ) -> Result<(), UsageError> {
        let entry = self.entry_mut(label, location);

        if entry.pending.is_some() {
            return Err(UsageError::AlreadyRunning {
                label: label.to_owned(),
            });
        }

        entry.pending = Some(now);
        Ok(())
    }

    /// Closes the pending interval of `label` at `now`, returning the length of the interval.
    pub(crate) fn stop(&mut self, label: &str, now: Timestamp) -> Result<Duration, UsageError> {
        let not_running = || UsageError::NotRunning {
            label: label.to_owned(),
        };

        let position = *self.index.get(label).ok_or_else(not_running)?;
        let entry = self
            .entries
            .get_mut(position)
            .expect("index only holds positions of existing entries");
        let started = entry.pending.take().ok_or_else(not_running)?;

        let interval = Clock::elapsed(started, now);
        entry.stats.accumulated = entry.stats.accumulated.checked_add(interval).expect(
            "timer accumulation overflows Duration - this indicates an unrealistic scenario",
        );
        entry.stats.invocation_count = entry.stats.invocation_count.checked_add(1).expect(
            "invocation count overflows u64 - this indicates an unrealistic scenario",
        );

        Ok(interval)
    }

    pub(crate) fn is_running(&self, label: &str) -> bool {
        self.index
            .get(label)
            .and_then(|&position| self.entries.get(position))
            .is_some_and(|entry| entry.pending.is_some())
    }

    /// Labels with an unmatched start, in order.
    pub(crate) fn pending(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.pending.is_some())
            .map(|entry| entry.label.as_str())
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            timers: self
                .entries
                .iter()
                .map(|entry| (entry.label.clone(), entry.stats))
                .collect(),
        }
    }

    /// Report entries of every label with at least one completed interval, in order.
    pub(crate) fn report_entries(&self) -> Vec<ReportEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.stats.invocation_count > 0)
            .map(|entry| {
                ReportEntry::new(
                    entry.label.clone(),
                    entry.location,
                    entry.stats.accumulated,
                    entry.stats.invocation_count,
                )
            })
            .collect()
    }
}
