//! Wire types for the agent's WebSocket and HTTP surfaces.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize, Serializer};

/// Ceiling used in place of infinities so every number stays valid JSON.
pub const FLOAT_CAP: f64 = 1e10;

/// NaN becomes 0, infinities clamp to +/-`FLOAT_CAP`.
pub fn sanitize_float(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else if v.is_infinite() {
        FLOAT_CAP.copysign(v)
    } else {
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(timestamp: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp,
            x: sanitize_float(x),
            y: sanitize_float(y),
            z: sanitize_float(z),
        }
    }
}

/// Local wall-clock ISO-8601 without offset, e.g. `2025-01-01T12:00:00.123456`.
pub fn iso_local(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}

fn ser_iso<S: Serializer>(ms: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&iso_local(*ms))
}

/// Raw detector output for one window. `timestamp` is epoch ms internally and
/// goes out as an ISO string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub is_anomaly: bool,
    pub confidence: f64,
    pub distance: f64,
    pub threshold: f64,
    #[serde(serialize_with = "ser_iso")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
}

/// The status object pushed to clients and served by `/realtime/state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPayload {
    pub is_anomaly: bool,
    pub confidence: f64,
    pub distance: f64,
    pub threshold: f64,
    pub timestamp: Option<String>,
    pub status_color: StatusColor,
}

impl Default for StatusPayload {
    fn default() -> Self {
        Self {
            is_anomaly: false,
            confidence: 0.0,
            distance: 0.0,
            threshold: 0.0,
            timestamp: None,
            status_color: StatusColor::Green,
        }
    }
}

/// Red when the detector flags an anomaly, yellow when the distance passes
/// 70% of the threshold, green otherwise.
pub fn classify(p: &Prediction) -> StatusColor {
    if p.is_anomaly {
        StatusColor::Red
    } else if p.distance > p.threshold * 0.7 {
        StatusColor::Yellow
    } else {
        StatusColor::Green
    }
}

impl From<&Prediction> for StatusPayload {
    fn from(p: &Prediction) -> Self {
        Self {
            is_anomaly: p.is_anomaly,
            confidence: sanitize_float(p.confidence),
            distance: sanitize_float(p.distance),
            threshold: sanitize_float(p.threshold),
            timestamp: Some(iso_local(p.timestamp)),
            status_color: classify(p),
        }
    }
}

/// Everything the agent sends over `/ws`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Connected {
        status: StatusPayload,
        samples_count: usize,
        message: String,
    },
    Prediction {
        status: StatusPayload,
        samples_count: usize,
        result: Prediction,
    },
    State {
        status: StatusPayload,
        samples_count: usize,
    },
    Samples {
        samples: Vec<Sample>,
    },
    SensorDisconnected {
        message: String,
        disconnect_time: String,
        total_disconnections: u32,
    },
    SensorReconnected {
        message: String,
        reconnect_time: String,
        downtime_seconds: f64,
    },
    Ping,
    Pong,
}

impl ServerMsg {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub const WS_SAMPLES_DEFAULT: usize = 100;

fn ws_samples_default() -> usize {
    WS_SAMPLES_DEFAULT
}

/// Client requests over `/ws`. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Ping,
    GetState,
    GetSamples {
        #[serde(default = "ws_samples_default")]
        limit: usize,
    },
}
