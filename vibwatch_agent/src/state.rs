//! Shared agent state: latest status, recent samples, detector and the
//! broadcast fan-out to WebSocket clients.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::detector::Detector;
use crate::link::{LinkEvent, SensorLink};
use crate::types::{Sample, ServerMsg, StatusPayload};

pub const MAX_SAMPLES: usize = 2000;
const BROADCAST_DEPTH: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub latest: Arc<RwLock<StatusPayload>>,
    pub samples: Arc<RwLock<VecDeque<Sample>>>,
    pub detector: Arc<Mutex<Detector>>,
    pub link: Arc<Mutex<SensorLink>>,
    pub events: broadcast::Sender<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_DEPTH);
        Self {
            latest: Arc::new(RwLock::new(StatusPayload::default())),
            samples: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_SAMPLES))),
            detector: Arc::new(Mutex::new(Detector::default())),
            link: Arc::new(Mutex::new(SensorLink::default())),
            events,
        }
    }

    /// Store a batch, score it and tell every client.
    pub async fn ingest(&self, batch: Vec<Sample>, now_ms: i64) {
        if let Some(ev) = self.link.lock().await.touch(now_ms) {
            if let LinkEvent::Reconnected { downtime_ms } = ev {
                info!(downtime_ms, "sensor reconnected");
            }
            self.publish(ev.into_msg(now_ms));
        }

        let prediction = self.detector.lock().await.predict(&batch, now_ms);
        let status = StatusPayload::from(&prediction);
        if prediction.is_anomaly {
            warn!(distance = prediction.distance, confidence = prediction.confidence, "anomaly detected");
        }

        let samples_count = {
            let mut s = self.samples.write().await;
            for sample in batch {
                if s.len() == MAX_SAMPLES {
                    s.pop_front();
                }
                s.push_back(sample);
            }
            s.len()
        };
        *self.latest.write().await = status.clone();

        self.publish(ServerMsg::Prediction {
            status,
            samples_count,
            result: prediction,
        });
    }

    /// Sensor timeout check; call on the watcher cadence.
    pub async fn check_link(&self, now_ms: i64) {
        if let Some(ev) = self.link.lock().await.check(now_ms) {
            if let LinkEvent::Disconnected { silent_ms, .. } = ev {
                warn!(silent_ms, "sensor stopped sending data");
            }
            self.publish(ev.into_msg(now_ms));
        }
    }

    pub async fn status(&self) -> StatusPayload {
        self.latest.read().await.clone()
    }

    pub async fn samples_count(&self) -> usize {
        self.samples.read().await.len()
    }

    /// The newest `limit` samples, oldest first.
    pub async fn recent_samples(&self, limit: usize) -> Vec<Sample> {
        let s = self.samples.read().await;
        let skip = s.len().saturating_sub(limit);
        s.iter().skip(skip).copied().collect()
    }

    fn publish(&self, msg: ServerMsg) {
        // an error only means no client is connected right now
        let _ = self.events.send(msg.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize, t0: i64) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(t0 + i as i64, 0.0, 0.0, 9.8))
            .collect()
    }

    #[tokio::test]
    async fn ingest_updates_state_and_broadcasts() {
        let state = AppState::new();
        let mut rx = state.events.subscribe();
        state.ingest(batch(20, 0), 100).await;

        assert_eq!(state.samples_count().await, 20);
        assert_eq!(state.status().await.timestamp, Some(crate::types::iso_local(100)));
        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "prediction");
        assert_eq!(msg["samples_count"], 20);
        assert!(msg["status"]["status_color"].is_string());
    }

    #[tokio::test]
    async fn sample_ring_is_capped() {
        let state = AppState::new();
        for i in 0..(MAX_SAMPLES / 20 + 5) {
            state.ingest(batch(20, i as i64 * 20), i as i64).await;
        }
        assert_eq!(state.samples_count().await, MAX_SAMPLES);
        let last = state.recent_samples(3).await;
        assert_eq!(last.len(), 3);
        assert!(last[0].timestamp < last[2].timestamp);
        assert_eq!(state.recent_samples(10_000).await.len(), MAX_SAMPLES);
    }

    #[tokio::test]
    async fn silence_then_data_emits_link_events() {
        let state = AppState::new();
        let mut rx = state.events.subscribe();
        state.ingest(batch(1, 0), 0).await;
        let _prediction = rx.recv().await.unwrap();

        state.check_link(5_000).await;
        state.check_link(10_001).await;
        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "sensor_disconnected");
        // reported once
        state.check_link(12_000).await;

        state.ingest(batch(1, 13_000), 13_000).await;
        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "sensor_reconnected");
        assert_eq!(msg["downtime_seconds"], 2.999);
        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "prediction");
    }
}
