//! Scripted vibration source: cycles through healthy, drifting, failing and
//! silent phases so every client state can be seen without hardware.

use std::f64::consts::FRAC_PI_2;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;
use crate::types::Sample;

/// One batch every 200 ms at 100 Hz.
pub const BATCH_EVERY: Duration = Duration::from_millis(200);
pub const BATCH_LEN: usize = 20;

const HEALTHY_AMPLITUDE: f64 = 0.5;
const GRAVITY: f64 = 9.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Normal,
    Drifting,
    Anomalous,
    Silent,
}

impl Phase {
    fn amplitude(self) -> f64 {
        match self {
            Phase::Normal => HEALTHY_AMPLITUDE,
            Phase::Drifting => HEALTHY_AMPLITUDE * 1.45,
            Phase::Anomalous => HEALTHY_AMPLITUDE * 5.0,
            Phase::Silent => 0.0,
        }
    }
}

/// (phase, batches). Silent lasts past the sensor timeout on purpose.
pub const SCRIPT: &[(Phase, u32)] = &[
    (Phase::Normal, 150),
    (Phase::Drifting, 50),
    (Phase::Anomalous, 50),
    (Phase::Normal, 50),
    (Phase::Silent, 70),
];

pub struct Simulator {
    step: usize,
    batch_in_step: u32,
    sample_index: u64,
    batches: u64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            step: 0,
            batch_in_step: 0,
            sample_index: 0,
            batches: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        SCRIPT[self.step].0
    }

    /// Advance one batch period. `None` while the sensor is silent.
    pub fn next_batch(&mut self, now_ms: i64) -> Option<Vec<Sample>> {
        let phase = self.phase();
        let out = match phase {
            Phase::Silent => None,
            _ => Some(self.tone(phase.amplitude(), now_ms)),
        };
        self.batches += 1;
        self.batch_in_step += 1;
        if self.batch_in_step >= SCRIPT[self.step].1 {
            self.batch_in_step = 0;
            self.step = (self.step + 1) % SCRIPT.len();
            debug!(phase = ?self.phase(), "simulator phase change");
        }
        out
    }

    /// 25 Hz tone at 100 Hz sampling, with a slow breathing of the amplitude
    /// so consecutive readings are not identical.
    fn tone(&mut self, amplitude: f64, now_ms: i64) -> Vec<Sample> {
        let a = amplitude * (1.0 + 0.02 * (self.batches as f64 * 0.3).sin());
        let n = BATCH_LEN as i64;
        (0..BATCH_LEN)
            .map(|i| {
                let p = FRAC_PI_2 * self.sample_index as f64;
                self.sample_index += 1;
                // spread timestamps so order survives within the batch
                let ts = now_ms - (n - 1 - i as i64);
                Sample::new(ts, a * p.sin(), a * (p + 1.0).sin(), GRAVITY + a * (p + 2.0).sin())
            })
            .collect()
    }
}

pub fn spawn_simulator(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_ms = every.as_millis() as u64, "simulator running");
        let mut sim = Simulator::new();
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let now = chrono::Utc::now().timestamp_millis();
            if let Some(batch) = sim.next_batch(now) {
                state.ingest(batch, now).await;
            }
        }
    })
}
