//! Types that mirror the detector's JSON schema.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

/// Operator-facing severity. Wire values are "green"/"yellow"/"red";
/// anything else (or a missing color) degrades to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Severity {
    #[default]
    #[serde(rename = "green")]
    Normal,
    #[serde(rename = "yellow")]
    Warning,
    #[serde(rename = "red")]
    Critical,
}

impl Severity {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "yellow" => Severity::Warning,
            "red" => Severity::Critical,
            _ => Severity::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Alert",
            Severity::Critical => "ANOMALY",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // Non-string colors (null, numbers) are treated like unknown strings
        let v = serde_json::Value::deserialize(d)?;
        Ok(v.as_str().map(Severity::from_wire).unwrap_or_default())
    }
}

/// One accelerometer reading on three axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One classification emitted by the upstream detector.
///
/// Numeric fields are optional: a detector that omits one still produces a
/// displayable payload, the missing value renders as a placeholder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(rename = "status_color", alias = "statusColor", default)]
    pub status_color: Severity,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Epoch milliseconds. Detectors send either a number or an ISO-8601
    /// string; anything unreadable becomes `None`.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<i64>,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        serde_json::Value::String(s) => parse_time(&s),
        _ => None,
    })
}

/// RFC 3339 with an offset, or a naive ISO-8601 time read as local time.
pub fn parse_time(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp_millis())
}

/// Message types the client reacts to. Everything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Prediction,
    State,
    Connected,
    SensorDisconnected,
    SensorReconnected,
    Other(String),
}

impl MessageKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "prediction" => MessageKind::Prediction,
            "state" => MessageKind::State,
            "connected" => MessageKind::Connected,
            "sensor_disconnected" => MessageKind::SensorDisconnected,
            "sensor_reconnected" => MessageKind::SensorReconnected,
            other => MessageKind::Other(other.to_string()),
        }
    }

    /// Kinds whose `status` field is applied to the classifier.
    pub fn carries_status(&self) -> bool {
        matches!(
            self,
            MessageKind::Prediction | MessageKind::State | MessageKind::Connected
        )
    }
}

/// Inbound push message envelope. `samples` may ride along on any type.
#[derive(Debug, Clone, Deserialize)]
pub struct Inbound {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    pub status: Option<StatusPayload>,
    #[serde(default)]
    pub samples: Option<Vec<Sample>>,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_wire(&self.kind)
    }
}

/// Outbound keepalive: `{"type":"ping"}`.
#[derive(Debug, Serialize)]
pub struct Ping {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl Ping {
    pub fn json() -> String {
        // Serializing a static struct cannot fail
        serde_json::to_string(&Ping { kind: "ping" }).unwrap_or_else(|_| r#"{"type":"ping"}"#.into())
    }
}

/// Body of `GET /realtime/samples`.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplesResponse {
    #[serde(default)]
    pub samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_color_degrades_to_normal() {
        let p: StatusPayload =
            serde_json::from_str(r#"{"status_color":"purple","confidence":0.5}"#).unwrap();
        assert_eq!(p.status_color, Severity::Normal);
        let p: StatusPayload = serde_json::from_str(r#"{"status_color":null}"#).unwrap();
        assert_eq!(p.status_color, Severity::Normal);
        let p: StatusPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.status_color, Severity::Normal);
        assert!(p.distance.is_none());
    }

    #[test]
    fn camel_case_color_is_accepted() {
        let p: StatusPayload =
            serde_json::from_str(r#"{"statusColor":"red","confidence":0.92,"distance":1.5,"threshold":0.8,"timestamp":1000}"#)
                .unwrap();
        assert_eq!(p.status_color, Severity::Critical);
        assert_eq!(p.timestamp, Some(1000));
    }

    #[test]
    fn envelope_tolerates_extra_fields_and_unknown_types() {
        let m = Inbound::parse(
            r#"{"type":"prediction","status":{"status_color":"yellow","is_anomaly":false},"samples_count":3,"result":{}}"#,
        )
        .unwrap();
        assert_eq!(m.kind(), MessageKind::Prediction);
        assert_eq!(m.status.unwrap().status_color, Severity::Warning);

        let m = Inbound::parse(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(m.kind(), MessageKind::Other("pong".into()));
        assert!(!m.kind().carries_status());

        let m = Inbound::parse(r#"{"type":"samples","samples":[{"x":1.0,"y":2.0,"z":3.0}]}"#).unwrap();
        assert_eq!(m.samples.unwrap().len(), 1);
    }

    #[test]
    fn detector_iso_timestamps_are_accepted() {
        let m = Inbound::parse(
            r#"{"type":"prediction","status":{"is_anomaly":true,"confidence":0.92,"distance":4.1,"threshold":3.0,"timestamp":"2025-01-01T12:00:00.123456","status_color":"red"},"result":{"feature_values":{},"timestamp":"2025-01-01T12:00:00.123456"},"samples_count":40}"#,
        )
        .unwrap();
        let st = m.status.unwrap();
        assert_eq!(st.status_color, Severity::Critical);
        let want = Local
            .with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
            .earliest()
            .unwrap()
            .timestamp_millis()
            + 123;
        assert_eq!(st.timestamp, Some(want));

        // flat /realtime/state body
        let p: StatusPayload = serde_json::from_str(
            r#"{"is_anomaly":false,"confidence":0.1,"distance":0.4,"threshold":3.0,"timestamp":"2025-01-01T12:00:00","status_color":"green"}"#,
        )
        .unwrap();
        assert_eq!(p.timestamp, Some(want - 123));
    }

    #[test]
    fn timestamp_forms() {
        let ts = |json: &str| serde_json::from_str::<StatusPayload>(json).unwrap().timestamp;
        assert_eq!(ts(r#"{"timestamp":1000}"#), Some(1000));
        assert_eq!(ts(r#"{"timestamp":1000.6}"#), Some(1001));
        assert_eq!(ts(r#"{"timestamp":"1970-01-01T00:00:01Z"}"#), Some(1000));
        assert_eq!(ts(r#"{"timestamp":"1970-01-01T01:00:01+01:00"}"#), Some(1000));
        assert_eq!(ts(r#"{"timestamp":"yesterday"}"#), None);
        assert_eq!(ts(r#"{"timestamp":null}"#), None);
        assert_eq!(ts(r#"{"timestamp":[1]}"#), None);
    }

    #[test]
    fn ping_shape() {
        assert_eq!(Ping::json(), r#"{"type":"ping"}"#);
    }
}
