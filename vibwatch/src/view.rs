//! Dashboard view state: the terminal's implementation of the presentation sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::classifier::Diagnostics;
use crate::sink::{ConnectionState, PresentationSink};
use crate::types::{Sample, Severity};

#[derive(Debug, Clone)]
pub struct DashboardView {
    /// `None` while connecting or when showing the no-data state.
    pub severity: Option<Severity>,
    pub no_data: bool,
    pub diagnostics: Diagnostics,
    pub chart: Arc<[Sample]>,
    pub connection: ConnectionState,
    pub connection_msg: String,
    /// Status updates per second, refreshed by `tick_rate`.
    pub rate: u32,
    updates: u32,
    rate_since: Instant,
}

impl DashboardView {
    pub fn new() -> Self {
        Self {
            severity: None,
            no_data: false,
            diagnostics: Diagnostics::default(),
            chart: Arc::from(Vec::<Sample>::new()),
            connection: ConnectionState::Connecting,
            connection_msg: "Connecting...".into(),
            rate: 0,
            updates: 0,
            rate_since: Instant::now(),
        }
    }

    /// Alert banner text. Hidden for Normal and in the no-data state.
    pub fn alert_banner(&self) -> Option<(Severity, String)> {
        match self.severity? {
            Severity::Critical => Some((
                Severity::Critical,
                format!(
                    "Anomaly detected! Confidence: {:.1}%",
                    self.diagnostics.confidence.unwrap_or(0.0) * 100.0
                ),
            )),
            Severity::Warning => Some((
                Severity::Warning,
                "Suspicious behaviour detected - monitoring...".into(),
            )),
            Severity::Normal => None,
        }
    }

    /// Footer line for the status card.
    pub fn situation(&self) -> &'static str {
        if self.no_data {
            return "Waiting for sensor";
        }
        match self.severity {
            Some(Severity::Normal) => "System operating normally",
            Some(Severity::Warning) => "Suspicious behaviour detected",
            Some(Severity::Critical) => "Anomaly detected!",
            None => "Connecting...",
        }
    }

    /// Recompute updates/s once at least a second has passed.
    pub fn tick_rate(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.rate_since);
        if elapsed < Duration::from_secs(1) {
            return;
        }
        self.rate = (self.updates as f64 / elapsed.as_secs_f64()).round() as u32;
        self.updates = 0;
        self.rate_since = now;
    }
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for DashboardView {
    fn show_severity(&mut self, severity: Severity, diagnostics: &Diagnostics) {
        self.severity = Some(severity);
        self.no_data = false;
        self.diagnostics = diagnostics.clone();
        self.updates += 1;
    }

    fn show_no_data(&mut self) {
        self.severity = None;
        self.no_data = true;
        // threshold is a detector setting, not a live reading: keep it
        self.diagnostics = Diagnostics {
            threshold: self.diagnostics.threshold,
            ..Diagnostics::default()
        };
    }

    fn update_chart(&mut self, samples: Arc<[Sample]>) {
        self.chart = samples;
    }

    fn set_connection_indicator(&mut self, state: ConnectionState, message: &str) {
        self.connection = state;
        self.connection_msg = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(conf: f64) -> Diagnostics {
        Diagnostics {
            confidence: Some(conf),
            distance: Some(1.2),
            threshold: Some(0.8),
            timestamp: Some(5),
        }
    }

    #[test]
    fn banner_follows_severity() {
        let mut v = DashboardView::new();
        assert!(v.alert_banner().is_none());
        v.show_severity(Severity::Critical, &diag(0.923));
        let (sev, text) = v.alert_banner().unwrap();
        assert_eq!(sev, Severity::Critical);
        assert_eq!(text, "Anomaly detected! Confidence: 92.3%");
        v.show_severity(Severity::Warning, &diag(0.4));
        assert_eq!(v.alert_banner().unwrap().0, Severity::Warning);
        v.show_severity(Severity::Normal, &diag(0.1));
        assert!(v.alert_banner().is_none());
    }

    #[test]
    fn no_data_hides_banner_and_clears_readings() {
        let mut v = DashboardView::new();
        v.show_severity(Severity::Critical, &diag(0.9));
        v.show_no_data();
        assert!(v.alert_banner().is_none());
        assert!(v.no_data);
        assert_eq!(v.diagnostics.confidence, None);
        assert_eq!(v.diagnostics.distance, None);
        assert_eq!(v.diagnostics.timestamp, None);
        assert_eq!(v.diagnostics.threshold, Some(0.8));
        assert_eq!(v.situation(), "Waiting for sensor");
    }

    #[test]
    fn update_rate() {
        let mut v = DashboardView::new();
        let t0 = v.rate_since;
        for _ in 0..10 {
            v.show_severity(Severity::Normal, &diag(0.1));
        }
        v.tick_rate(t0 + Duration::from_millis(500));
        assert_eq!(v.rate, 0);
        v.tick_rate(t0 + Duration::from_secs(2));
        assert_eq!(v.rate, 5);
    }
}
