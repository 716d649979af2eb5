//! Status classification: payload -> displayed severity + transition.
//!
//! Every payload's color is taken verbatim. There is no smoothing or
//! hysteresis here; flapping control belongs to the detector upstream.

use chrono::{Local, TimeZone};

use crate::types::{Severity, StatusPayload};

/// Shown in place of a missing or cleared numeric field.
pub const PLACEHOLDER: &str = "—";

/// A change of displayed severity worth reporting to the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered `Warning` or `Critical`.
    Entered(Severity),
    /// Returned from a non-normal severity to `Normal`.
    BackToNormal,
}

/// Numeric diagnostics carried alongside a severity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub confidence: Option<f64>,
    pub distance: Option<f64>,
    pub threshold: Option<f64>,
    pub timestamp: Option<i64>,
}

impl Diagnostics {
    pub fn from_payload(p: &StatusPayload) -> Self {
        Self {
            confidence: p.confidence,
            distance: p.distance,
            threshold: p.threshold,
            timestamp: p.timestamp,
        }
    }

    /// Confidence as a percentage, e.g. "92.0%".
    pub fn confidence_pct(&self) -> String {
        self.confidence
            .map(|c| format!("{:.1}%", c * 100.0))
            .unwrap_or_else(|| PLACEHOLDER.into())
    }

    /// Confidence clamped to 0..=100 for gauges.
    pub fn confidence_gauge(&self) -> u16 {
        self.confidence
            .map(|c| (c * 100.0).clamp(0.0, 100.0).round() as u16)
            .unwrap_or(0)
    }

    pub fn distance_fmt(&self) -> String {
        fmt3(self.distance)
    }

    pub fn threshold_fmt(&self) -> String {
        fmt3(self.threshold)
    }

    /// Local wall-clock time of the payload, HH:MM:SS.
    pub fn updated_at(&self) -> String {
        self.timestamp
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| PLACEHOLDER.into())
    }
}

fn fmt3(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| PLACEHOLDER.into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub severity: Severity,
    pub diagnostics: Diagnostics,
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    displayed: Severity,
}

impl StatusClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last displayed severity (starts at `Normal`).
    pub fn displayed(&self) -> Severity {
        self.displayed
    }

    pub fn apply(&mut self, payload: &StatusPayload) -> Classified {
        let next = payload.status_color;
        let prev = self.displayed;
        self.displayed = next;
        Classified {
            severity: next,
            diagnostics: Diagnostics::from_payload(payload),
            transition: transition(prev, next),
        }
    }
}

fn transition(prev: Severity, next: Severity) -> Option<Transition> {
    if prev == next {
        return None;
    }
    match next {
        Severity::Warning | Severity::Critical => Some(Transition::Entered(next)),
        Severity::Normal => Some(Transition::BackToNormal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(color: Severity) -> StatusPayload {
        StatusPayload {
            status_color: color,
            confidence: Some(0.5),
            distance: Some(0.2),
            threshold: Some(0.8),
            timestamp: Some(1000),
        }
    }

    #[test]
    fn displayed_follows_every_payload() {
        let mut c = StatusClassifier::new();
        let seq = [
            Severity::Warning,
            Severity::Normal,
            Severity::Critical,
            Severity::Critical,
            Severity::Warning,
            Severity::Normal,
        ];
        for s in seq {
            let out = c.apply(&payload(s));
            assert_eq!(out.severity, s);
            assert_eq!(c.displayed(), s);
        }
    }

    #[test]
    fn transitions_are_reported_once() {
        let mut c = StatusClassifier::new();
        assert_eq!(c.apply(&payload(Severity::Normal)).transition, None);
        assert_eq!(
            c.apply(&payload(Severity::Critical)).transition,
            Some(Transition::Entered(Severity::Critical))
        );
        assert_eq!(c.apply(&payload(Severity::Critical)).transition, None);
        assert_eq!(
            c.apply(&payload(Severity::Warning)).transition,
            Some(Transition::Entered(Severity::Warning))
        );
        assert_eq!(
            c.apply(&payload(Severity::Normal)).transition,
            Some(Transition::BackToNormal)
        );
        assert_eq!(c.apply(&payload(Severity::Normal)).transition, None);
    }

    #[test]
    fn missing_numbers_render_placeholder() {
        let d = Diagnostics::default();
        assert_eq!(d.confidence_pct(), PLACEHOLDER);
        assert_eq!(d.distance_fmt(), PLACEHOLDER);
        assert_eq!(d.threshold_fmt(), PLACEHOLDER);
        assert_eq!(d.updated_at(), PLACEHOLDER);
        assert_eq!(d.confidence_gauge(), 0);
    }

    #[test]
    fn formats_diagnostics() {
        let d = Diagnostics {
            confidence: Some(0.92),
            distance: Some(1.5),
            threshold: Some(0.8),
            timestamp: None,
        };
        assert_eq!(d.confidence_pct(), "92.0%");
        assert_eq!(d.distance_fmt(), "1.500");
        assert_eq!(d.threshold_fmt(), "0.800");
        assert_eq!(d.confidence_gauge(), 92);
    }
}
