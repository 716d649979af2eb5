//! vibwatch: real-time vibration anomaly status monitor.
//!
//! Telemetry arrives over a WebSocket push link (with an HTTP polling
//! fallback), is classified into Normal / Warning / Critical, watched for
//! silence, and recorded as a persisted history of severity transitions.

pub mod app;
pub mod buffer;
pub mod classifier;
pub mod history;
pub mod liveness;
pub mod logging;
pub mod monitor;
pub mod profiles;
pub mod sink;
pub mod transport;
pub mod types;
pub mod ui;
pub mod view;

pub use app::App;
pub use history::{EventHistory, FileStore, KeyValueStore, MemoryStore};
pub use monitor::Monitor;
pub use sink::{ConnectionState, PresentationSink};
pub use transport::{Feed, TransportChannel, TransportConfig};
pub use types::{Sample, Severity, StatusPayload};
