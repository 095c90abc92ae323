//! Progress samples parsed from downloader output.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time transfer measurement.
///
/// `bytes_total == 0` means the total is unknown. `transfer_rate` and `eta`
/// are `None` when the tool did not report them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Completion in percent, 0.0 to 100.0.
    pub percent: f64,
    /// Bytes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<Duration>,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl ProgressSample {
    /// A sample carrying only a percentage.
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        Self {
            percent: clamp_percent(percent),
            ..Self::default()
        }
    }

    /// A sample computed from byte counters.
    #[must_use]
    pub fn from_bytes(bytes_done: u64, bytes_total: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = if bytes_total == 0 {
            0.0
        } else {
            bytes_done as f64 * 100.0 / bytes_total as f64
        };
        Self {
            percent: clamp_percent(percent),
            transfer_rate: None,
            eta: None,
            bytes_done,
            bytes_total,
        }
    }

    #[must_use]
    pub const fn with_rate(mut self, rate: Option<u64>) -> Self {
        self.transfer_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_eta(mut self, eta: Option<Duration>) -> Self {
        self.eta = eta;
        self
    }

    /// Attach byte counters without recomputing the percentage.
    #[must_use]
    pub const fn with_bytes(mut self, bytes_done: u64, bytes_total: u64) -> Self {
        self.bytes_done = bytes_done;
        self.bytes_total = bytes_total;
        self
    }

    #[must_use]
    pub const fn total_known(&self) -> bool {
        self.bytes_total > 0
    }
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}
