use crate::types::config::ProgressSettings;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const COMPLETE: f64 = 100.0;

/// Shared progress value in `0..=100`, observable through `watch` receivers.
#[derive(Debug, Clone)]
pub struct ProgressGauge {
    sender: Arc<watch::Sender<f64>>,
}

impl Default for ProgressGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressGauge {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0.0);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn value(&self) -> f64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.sender.subscribe()
    }

    /// Raises the value by `increment` without passing `cap`. Never lowers it.
    pub fn advance(&self, increment: f64, cap: f64) -> f64 {
        self.sender.send_if_modified(|value| {
            let next = (*value + increment).min(cap);
            if next > *value {
                *value = next;
                true
            } else {
                false
            }
        });
        self.value()
    }

    pub fn complete(&self) {
        self.sender.send_replace(COMPLETE);
    }

    pub fn reset(&self) {
        self.sender.send_replace(0.0);
    }
}

/// Periodic task that nudges a [`ProgressGauge`] forward while analysis is in
/// flight. The task is aborted when the simulator is stopped or dropped.
#[derive(Debug)]
pub struct ProgressSimulator {
    task: JoinHandle<()>,
}

impl ProgressSimulator {
    pub fn start<R>(settings: ProgressSettings, gauge: ProgressGauge, mut rng: R) -> Self
    where
        R: Rng + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(
                Instant::now() + settings.tick_interval,
                settings.tick_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let increment = if settings.max_increment > 0.0 {
                    rng.random_range(0.0..settings.max_increment)
                } else {
                    0.0
                };
                let value = gauge.advance(increment, settings.cap);
                tracing::debug!(progress = value, "progress tick");
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ProgressSimulator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
