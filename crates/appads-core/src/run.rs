use serde::{Deserialize, Serialize};

use crate::LookupResult;

/// Counters for one extraction run. Owned by a single writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub processed: usize,
    pub success: usize,
    pub error: usize,
    pub matched: usize,
    pub with_declaration: usize,
    pub total_expected: usize,
}

impl RunState {
    #[must_use]
    pub fn new(total_expected: usize) -> Self {
        Self {
            total_expected,
            ..Self::default()
        }
    }

    /// Counts one result. Callers guarantee each identifier is recorded once.
    pub fn record(&mut self, result: &LookupResult) {
        self.processed += 1;
        if result.is_success() {
            self.success += 1;
        } else {
            self.error += 1;
        }
        if result.has_declaration() {
            self.with_declaration += 1;
        }
        if result.is_match() {
            self.matched += 1;
        }
    }

    /// `processed == success + error`.
    #[must_use]
    pub fn reconciles(&self) -> bool {
        self.processed == self.success + self.error
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total_expected
    }

    /// Progress percentage, held at 99 until the run is marked complete.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percent(&self) -> u8 {
        if self.total_expected == 0 {
            return 0;
        }
        let pct = ((self.processed as f64 / self.total_expected as f64) * 100.0).round() as u64;
        pct.min(99) as u8
    }
}
