//! Sensor link bookkeeping: notices when the data source goes quiet and
//! when it comes back.

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::state::AppState;
use crate::types::ServerMsg;

pub const SENSOR_TIMEOUT_MS: i64 = 10_000;
pub const WATCH_EVERY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { silent_ms: i64, total: u32 },
    Reconnected { downtime_ms: i64 },
}

impl LinkEvent {
    pub fn into_msg(self, now_ms: i64) -> ServerMsg {
        let at = rfc3339(now_ms);
        match self {
            LinkEvent::Disconnected { silent_ms, total } => ServerMsg::SensorDisconnected {
                message: format!("Sensor silent for {:.1}s", silent_ms as f64 / 1000.0),
                disconnect_time: at,
                total_disconnections: total,
            },
            LinkEvent::Reconnected { downtime_ms } => ServerMsg::SensorReconnected {
                message: format!(
                    "Sensor reconnected after {:.1}s offline",
                    downtime_ms as f64 / 1000.0
                ),
                reconnect_time: at,
                downtime_seconds: downtime_ms as f64 / 1000.0,
            },
        }
    }
}

fn rfc3339(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct SensorLink {
    connected: bool,
    last_data_ms: Option<i64>,
    disconnected_at: Option<i64>,
    total_disconnections: u32,
}

impl SensorLink {
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn total_disconnections(&self) -> u32 {
        self.total_disconnections
    }

    /// Data arrived. Reports a reconnect only after a reported disconnect.
    pub fn touch(&mut self, now_ms: i64) -> Option<LinkEvent> {
        self.last_data_ms = Some(now_ms);
        if self.connected {
            return None;
        }
        self.connected = true;
        self.disconnected_at.take().map(|at| LinkEvent::Reconnected {
            downtime_ms: now_ms - at,
        })
    }

    /// Reports a disconnect once per silence longer than the timeout.
    pub fn check(&mut self, now_ms: i64) -> Option<LinkEvent> {
        let last = self.last_data_ms?;
        let silent_ms = now_ms - last;
        if !self.connected || silent_ms <= SENSOR_TIMEOUT_MS {
            return None;
        }
        self.connected = false;
        self.disconnected_at = Some(now_ms);
        self.total_disconnections += 1;
        Some(LinkEvent::Disconnected {
            silent_ms,
            total: self.total_disconnections,
        })
    }
}

pub fn spawn_link_watcher(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            tick.tick().await;
            state.check_link(chrono::Utc::now().timestamp_millis()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_ever_is_not_a_disconnect() {
        let mut l = SensorLink::default();
        assert_eq!(l.check(60_000), None);
        assert!(!l.connected());
    }

    #[test]
    fn first_data_is_silent_connect() {
        let mut l = SensorLink::default();
        assert_eq!(l.touch(0), None);
        assert!(l.connected());
    }

    #[test]
    fn timeout_is_strict_and_reported_once() {
        let mut l = SensorLink::default();
        l.touch(0);
        assert_eq!(l.check(10_000), None);
        assert_eq!(
            l.check(10_500),
            Some(LinkEvent::Disconnected {
                silent_ms: 10_500,
                total: 1
            })
        );
        assert_eq!(l.check(11_500), None);
        assert_eq!(l.touch(12_500), Some(LinkEvent::Reconnected { downtime_ms: 2_000 }));
        assert_eq!(l.total_disconnections(), 1);
    }

    #[test]
    fn messages_carry_wire_fields() {
        let m = LinkEvent::Reconnected { downtime_ms: 1_500 }.into_msg(0);
        let v: serde_json::Value = serde_json::from_str(&m.to_json()).unwrap();
        assert_eq!(v["type"], "sensor_reconnected");
        assert_eq!(v["downtime_seconds"], 1.5);
        assert_eq!(v["reconnect_time"], "1970-01-01T00:00:00+00:00");
    }
}
