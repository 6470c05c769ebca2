//! C/N0 estimation from link-quality samples
//!
//! The channel-estimation collaborator reports raw C/N0 samples per
//! terminal; the estimator reduces the samples inside a sliding window to a
//! single value used for waveform selection. Three reduction modes are
//! supported: last sample, window minimum (conservative) and window
//! average.

use std::collections::VecDeque;

use rtnsim_common::config::CnoEstimationMode;

/// Sliding-window C/N0 estimator.
#[derive(Debug, Clone)]
pub struct CnoEstimator {
    mode: CnoEstimationMode,
    window_ms: u64,
    samples: VecDeque<(u64, f64)>,
}

impl CnoEstimator {
    /// Creates an estimator with the given mode and window length.
    pub fn new(mode: CnoEstimationMode, window_ms: u64) -> Self {
        Self {
            mode,
            window_ms,
            samples: VecDeque::new(),
        }
    }

    /// Adds a sample taken at `now_ms`.
    pub fn add_sample(&mut self, now_ms: u64, cno_dbhz: f64) {
        self.samples.push_back((now_ms, cno_dbhz));
    }

    /// Returns the current estimate, or `None` when no sample is inside the
    /// window.
    pub fn estimate(&mut self, now_ms: u64) -> Option<f64> {
        self.trim(now_ms);

        match self.mode {
            CnoEstimationMode::Last => self.samples.back().map(|(_, cno)| *cno),
            CnoEstimationMode::Minimum => self
                .samples
                .iter()
                .map(|(_, cno)| *cno)
                .min_by(f64::total_cmp),
            CnoEstimationMode::Average => {
                if self.samples.is_empty() {
                    None
                } else {
                    let sum: f64 = self.samples.iter().map(|(_, cno)| cno).sum();
                    Some(sum / self.samples.len() as f64)
                }
            }
        }
    }

    fn trim(&mut self, now_ms: u64) {
        while let Some((ts, _)) = self.samples.front() {
            if now_ms.saturating_sub(*ts) > self.window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
