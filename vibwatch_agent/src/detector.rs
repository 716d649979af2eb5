//! Window detector: per-axis RMS features scored against a fixed baseline.
//!
//! The distance is a diagonal Mahalanobis distance of the features from the
//! baseline. A window counts as an anomaly only when at least two of the
//! last three windows exceeded the threshold.

use std::collections::VecDeque;

use crate::types::{sanitize_float, Prediction, Sample};

pub const THRESHOLD: f64 = 3.0;

/// Baseline RMS of a healthy machine (per axis, gravity removed) and its spread.
const BASELINE_MEAN: [f64; 3] = [0.3536, 0.3536, 0.3536];
const BASELINE_STD: [f64; 3] = [0.1, 0.1, 0.1];

const VOTE_WINDOW: usize = 3;
const VOTES_NEEDED: usize = 2;
const DISTANCE_HISTORY: usize = 10;

pub struct Detector {
    threshold: f64,
    votes: VecDeque<bool>,
    recent: VecDeque<f64>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(THRESHOLD)
    }
}

impl Detector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            votes: VecDeque::from(vec![false; VOTE_WINDOW]),
            recent: VecDeque::with_capacity(DISTANCE_HISTORY),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn predict(&mut self, window: &[Sample], now_ms: i64) -> Prediction {
        let distance = distance(&features(window));

        self.votes.pop_front();
        self.votes.push_back(distance > self.threshold);
        let is_anomaly = self.votes.iter().filter(|v| **v).count() >= VOTES_NEEDED;

        let confidence = self.confidence(distance);
        Prediction {
            is_anomaly,
            confidence,
            distance: sanitize_float(distance),
            threshold: self.threshold,
            timestamp: now_ms,
        }
    }

    /// Banded confidence, damped when the last readings are unstable.
    fn confidence(&mut self, distance: f64) -> f64 {
        if self.recent.len() == DISTANCE_HISTORY {
            self.recent.pop_front();
        }
        self.recent.push_back(distance);

        let t = self.threshold;
        let mut c = if distance < t * 0.5 {
            0.05
        } else if distance < t * 0.8 {
            0.15
        } else if distance < t {
            0.25
        } else if distance < t * 1.2 {
            0.45
        } else if distance < t * 1.5 {
            0.65
        } else if distance < t * 2.0 {
            0.80
        } else {
            0.90
        };

        if self.recent.len() >= 3 {
            let last: Vec<f64> = self.recent.iter().rev().take(3).copied().collect();
            let mean = last.iter().sum::<f64>() / 3.0;
            let var = last.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / 3.0;
            if var.sqrt() > mean * 0.3 {
                c *= 0.7;
            }
            if (distance - mean).abs() > mean * 0.5 {
                c *= 0.8;
            }
        }
        sanitize_float(c).clamp(0.0, 1.0)
    }
}

/// Per-axis RMS after removing each axis's mean.
fn features(window: &[Sample]) -> [f64; 3] {
    if window.is_empty() {
        return [0.0; 3];
    }
    let n = window.len() as f64;
    let axes: [fn(&Sample) -> f64; 3] = [|s| s.x, |s| s.y, |s| s.z];
    let mut out = [0.0; 3];
    for (i, axis) in axes.iter().enumerate() {
        let mean = window.iter().map(axis).sum::<f64>() / n;
        let ms = window.iter().map(|s| (axis(s) - mean).powi(2)).sum::<f64>() / n;
        out[i] = ms.sqrt();
    }
    out
}

fn distance(f: &[f64; 3]) -> f64 {
    f.iter()
        .zip(BASELINE_MEAN.iter().zip(BASELINE_STD.iter()))
        .map(|(v, (m, s))| ((v - m) / s).powi(2))
        .sum::<f64>()
        .sqrt()
}
