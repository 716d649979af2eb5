//! Routes transport feed into the buffer, classifier, liveness monitor and
//! history store, and pushes the results to the presentation sink.

use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::classifier::StatusClassifier;
use crate::history::{EventHistory, KeyValueStore, StoreError};
use crate::liveness::{Liveness, LivenessMonitor};
use crate::sink::{ConnectionState, PresentationSink};
use crate::transport::Feed;
use crate::types::{MessageKind, Sample, Severity, StatusPayload};

pub struct Monitor<S: KeyValueStore, P: PresentationSink> {
    buffer: SampleBuffer,
    classifier: StatusClassifier,
    liveness: LivenessMonitor,
    history: EventHistory<S>,
    sink: P,
}

impl<S: KeyValueStore, P: PresentationSink> Monitor<S, P> {
    pub fn new(history: EventHistory<S>, sink: P) -> Self {
        Self::with_liveness(history, sink, LivenessMonitor::new())
    }

    pub fn with_liveness(history: EventHistory<S>, sink: P, liveness: LivenessMonitor) -> Self {
        Self {
            buffer: SampleBuffer::new(),
            classifier: StatusClassifier::new(),
            liveness,
            history,
            sink,
        }
    }

    pub fn handle(&mut self, feed: Feed, now_ms: i64) {
        match feed {
            Feed::Push(msg) => {
                let kind = msg.kind();
                match &kind {
                    k if k.carries_status() => {
                        if let Some(status) = &msg.status {
                            self.apply_status(status, now_ms);
                        }
                        self.data_arrived(now_ms);
                        self.sink
                            .set_connection_indicator(ConnectionState::Connected, "Receiving data");
                    }
                    MessageKind::SensorDisconnected => {
                        info!("upstream reports sensor disconnected");
                        self.sink.set_connection_indicator(
                            ConnectionState::Disconnected,
                            "Sensor disconnected",
                        );
                    }
                    MessageKind::SensorReconnected => {
                        info!("upstream reports sensor reconnected");
                        self.data_arrived(now_ms);
                        self.sink
                            .set_connection_indicator(ConnectionState::Connected, "Sensor reconnected");
                    }
                    MessageKind::Other(t) => debug!(kind = %t, "ignoring message type"),
                    _ => {}
                }
                if let Some(samples) = msg.samples {
                    self.apply_samples(&samples, now_ms, true);
                }
            }
            Feed::PolledState(status) => {
                self.apply_status(&status, now_ms);
                self.data_arrived(now_ms);
            }
            Feed::PolledSamples(samples) => self.apply_samples(&samples, now_ms, true),
            // redundant poll path beside push: refreshes the chart only
            Feed::SafetySamples(samples) => self.apply_samples(&samples, now_ms, false),
            Feed::Link(state, message) => self.sink.set_connection_indicator(state, &message),
        }
    }

    /// Periodic liveness check; call on the check cadence.
    pub fn tick(&mut self, now_ms: i64) {
        if self.liveness.check(now_ms) {
            warn!("no telemetry within deadline, showing no-data state");
            self.sink
                .set_connection_indicator(ConnectionState::Disconnected, "No sensor data");
            self.sink.show_no_data();
        }
    }

    /// Clear history after an explicit yes from `confirm`.
    pub fn clear_history(
        &mut self,
        now_ms: i64,
        confirm: impl FnOnce() -> bool,
    ) -> Result<bool, StoreError> {
        self.history.clear(now_ms, confirm)
    }

    /// Severity currently on screen; `None` while connecting or in no-data.
    pub fn displayed_severity(&self) -> Option<Severity> {
        match self.liveness.state() {
            Some(Liveness::DataFlowing) => Some(self.classifier.displayed()),
            _ => None,
        }
    }

    pub fn liveness(&self) -> Option<Liveness> {
        self.liveness.state()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn history(&self) -> &EventHistory<S> {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut EventHistory<S> {
        &mut self.history
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    fn apply_status(&mut self, status: &StatusPayload, now_ms: i64) {
        let out = self.classifier.apply(status);
        if let Some(t) = out.transition {
            if let Err(e) = self.history.record(t, &out.diagnostics, now_ms) {
                warn!(error = %e, "could not persist history transition");
            }
        }
        self.sink.show_severity(out.severity, &out.diagnostics);
    }

    fn apply_samples(&mut self, samples: &[Sample], now_ms: i64, counts_as_data: bool) {
        if self.buffer.push(samples) {
            self.sink.update_chart(self.buffer.snapshot());
            if counts_as_data {
                self.data_arrived(now_ms);
            }
        }
    }

    fn data_arrived(&mut self, now_ms: i64) {
        if self.liveness.record(now_ms) {
            debug!("telemetry flowing");
        }
    }
}
