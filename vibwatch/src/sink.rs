//! Presentation seam. The monitor pushes into a sink and never reads back.

use std::sync::Arc;

use crate::classifier::Diagnostics;
use crate::types::{Sample, Severity};

/// Transport-level connection state, shown by the connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

pub trait PresentationSink {
    fn show_severity(&mut self, severity: Severity, diagnostics: &Diagnostics);
    /// Distinct "no data" state: not a severity, no alert banner, numbers cleared.
    fn show_no_data(&mut self);
    fn update_chart(&mut self, samples: Arc<[Sample]>);
    fn set_connection_indicator(&mut self, state: ConnectionState, message: &str);
}
