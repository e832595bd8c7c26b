//! Client-side run counters with throttled progress notifications.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use appads_core::{LookupResult, RunState};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Percentages that always notify, even inside the throttle interval.
pub const MILESTONES: [u8; 3] = [25, 50, 75];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub state: RunState,
    pub percent: u8,
    /// Set when this update was triggered by crossing a milestone.
    pub milestone: Option<u8>,
    pub complete: bool,
}

pub trait ProgressListener {
    fn on_progress(&mut self, update: &ProgressUpdate);
}

impl<F: FnMut(&ProgressUpdate)> ProgressListener for F {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update);
    }
}

/// Counts each identifier's result once and notifies a listener at most
/// once per interval, on milestones, and on completion.
pub struct ProgressAggregator<L> {
    state: RunState,
    seen: HashSet<String>,
    interval: Duration,
    last_notified: Option<Instant>,
    milestones_reached: usize,
    completed: bool,
    listener: L,
}

impl<L: ProgressListener> ProgressAggregator<L> {
    pub fn new(total_expected: usize, listener: L) -> Self {
        Self::with_interval(total_expected, DEFAULT_PROGRESS_INTERVAL, listener)
    }

    pub fn with_interval(total_expected: usize, interval: Duration, listener: L) -> Self {
        Self {
            state: RunState::new(total_expected),
            seen: HashSet::new(),
            interval,
            last_notified: None,
            milestones_reached: 0,
            completed: false,
            listener,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Counts `result`. Returns `false` when its identifier was already counted.
    pub fn record(&mut self, result: &LookupResult) -> bool {
        self.record_at(result, Instant::now())
    }

    /// [`ProgressAggregator::record`] with an explicit clock reading.
    pub fn record_at(&mut self, result: &LookupResult, now: Instant) -> bool {
        if self.completed || !self.seen.insert(result.identifier.clone()) {
            return false;
        }
        self.state.record(result);

        let percent = self.state.percent();
        let milestone = self.cross_milestones(percent);
        let due = self
            .last_notified
            .is_none_or(|last| now.duration_since(last) >= self.interval);

        if milestone.is_some() || due {
            self.notify(percent, milestone, false, now);
        }
        true
    }

    /// Marks the run finished and sends the final 100 % update.
    pub fn complete(&mut self) {
        self.complete_at(Instant::now());
    }

    pub fn complete_at(&mut self, now: Instant) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.notify(100, None, true, now);
    }

    fn cross_milestones(&mut self, percent: u8) -> Option<u8> {
        let reached = MILESTONES.iter().take_while(|m| percent >= **m).count();
        if reached > self.milestones_reached {
            self.milestones_reached = reached;
            Some(MILESTONES[reached - 1])
        } else {
            None
        }
    }

    fn notify(&mut self, percent: u8, milestone: Option<u8>, complete: bool, now: Instant) {
        self.last_notified = Some(now);
        let update = ProgressUpdate {
            state: self.state,
            percent,
            milestone,
            complete,
        };
        self.listener.on_progress(&update);
    }
}
