//! Cycle arguments and per-cycle reports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::names::ExecutorName;

/// The single opaque value handed to one run cycle.
///
/// Thread-backed executors pass a snapshot of their termination flag,
/// tick-driven ones pass the time elapsed since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CycleArg {
    #[default]
    None,
    Terminated(bool),
    Elapsed(Duration),
}

impl CycleArg {
    /// Host-supplied time since the previous cycle, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            CycleArg::Elapsed(d) => Some(*d),
            _ => None,
        }
    }

    /// Seconds since the previous cycle (the host's "time per frame").
    pub fn time_per_frame(&self) -> Option<f32> {
        self.elapsed().map(|d| d.as_secs_f32())
    }

    pub fn terminated(&self) -> Option<bool> {
        match self {
            CycleArg::Terminated(t) => Some(*t),
            _ => None,
        }
    }
}

/// Why a cycle did no work at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The executor's activation flag is off.
    Disabled,
    /// The executor has been terminated.
    Terminated,
    /// Another cycle on the same executor is still in progress.
    Busy,
}

/// Summary of one executor cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub executor: ExecutorName,
    /// Tasks whose body was invoked (including failed ones).
    pub ran: usize,
    /// Tasks whose body returned an error or panicked.
    pub failed: usize,
    pub skipped: Option<SkipReason>,
}

impl CycleReport {
    pub fn completed(executor: ExecutorName, ran: usize, failed: usize) -> Self {
        Self {
            executor,
            ran,
            failed,
            skipped: None,
        }
    }

    pub fn skipped(executor: ExecutorName, reason: SkipReason) -> Self {
        Self {
            executor,
            ran: 0,
            failed: 0,
            skipped: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_only_reported_for_ticks() {
        let tick = CycleArg::Elapsed(Duration::from_millis(250));
        assert_eq!(tick.elapsed(), Some(Duration::from_millis(250)));
        assert_eq!(tick.time_per_frame(), Some(0.25));

        let looped = CycleArg::Terminated(false);
        assert_eq!(looped.elapsed(), None);
        assert_eq!(looped.terminated(), Some(false));
    }

    #[test]
    fn skipped_report_has_no_runs() {
        let report = CycleReport::skipped(ExecutorName::new("a"), SkipReason::Busy);
        assert!(report.is_skipped());
        assert_eq!(report.ran, 0);
    }
}
