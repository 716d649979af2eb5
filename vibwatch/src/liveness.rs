//! Silence detector, independent of the transport's own connection state.
//!
//! A socket can stay open while the sensor behind the server goes quiet, so
//! liveness is judged only from when telemetry last arrived. Times are epoch
//! milliseconds; checks are sampled (`now - last > deadline`), not per-message
//! timers.

use std::time::Duration;

pub const DEADLINE: Duration = Duration::from_secs(10);
pub const CHECK_EVERY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    DataFlowing,
    NoData,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    deadline_ms: i64,
    last_message_ms: Option<i64>,
    // None until the first message: shown as "connecting"
    state: Option<Liveness>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::with_deadline(DEADLINE)
    }

    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline_ms: deadline.as_millis() as i64,
            last_message_ms: None,
            state: None,
        }
    }

    pub fn state(&self) -> Option<Liveness> {
        self.state
    }

    /// Telemetry arrived. Returns true when this resumes flow (first message
    /// or recovery from `NoData`).
    pub fn record(&mut self, now_ms: i64) -> bool {
        self.last_message_ms = Some(now_ms);
        let resumed = self.state != Some(Liveness::DataFlowing);
        self.state = Some(Liveness::DataFlowing);
        resumed
    }

    /// Periodic check. Returns true exactly when this call enters `NoData`.
    pub fn check(&mut self, now_ms: i64) -> bool {
        let Some(last) = self.last_message_ms else {
            return false;
        };
        if self.state == Some(Liveness::DataFlowing) && now_ms - last > self.deadline_ms {
            self.state = Some(Liveness::NoData);
            return true;
        }
        false
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_undetermined() {
        let mut m = LivenessMonitor::new();
        assert_eq!(m.state(), None);
        assert!(!m.check(1_000_000));
        assert_eq!(m.state(), None);
    }

    #[test]
    fn deadline_boundary() {
        let mut m = LivenessMonitor::new();
        m.record(0);
        assert!(!m.check(9_000));
        assert_eq!(m.state(), Some(Liveness::DataFlowing));
        assert!(!m.check(10_000));
        assert!(m.check(11_000));
        assert_eq!(m.state(), Some(Liveness::NoData));
        // already in NoData: no repeated entry
        assert!(!m.check(14_000));
    }

    #[test]
    fn first_check_after_deadline_on_three_second_cadence() {
        let mut m = LivenessMonitor::new();
        m.record(0);
        let cadence = CHECK_EVERY.as_millis() as i64;
        let mut t = 0;
        let fired_at = loop {
            t += cadence;
            if m.check(t) {
                break t;
            }
        };
        assert_eq!(fired_at, 12_000);
    }

    #[test]
    fn any_message_resumes_immediately() {
        let mut m = LivenessMonitor::new();
        assert!(m.record(0));
        assert!(!m.record(500));
        assert!(m.check(20_000));
        assert!(m.record(20_100));
        assert_eq!(m.state(), Some(Liveness::DataFlowing));
        assert!(!m.check(21_000));
    }
}
