use serde::Serialize;
use std::sync::Mutex;

/// Counters shared between the coordinator and the status bridge.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub triggers_received: usize,
    pub triggers_discarded: usize,
    pub parameter_fetch_failures: usize,
    pub recordings_started: usize,
    pub recordings_failed: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Metrics)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_trigger(&self) {
        self.update(|m| m.triggers_received += 1);
    }

    pub fn record_discarded(&self, count: usize) {
        self.update(|m| m.triggers_discarded += count);
    }

    pub fn record_fetch_failure(&self) {
        self.update(|m| m.parameter_fetch_failures += 1);
    }

    pub fn record_recording(&self, success: bool) {
        self.update(|m| {
            m.recordings_started += 1;
            if !success {
                m.recordings_failed += 1;
            }
        });
    }

    pub fn snapshot(&self) -> Metrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            Metrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_recordings_count_as_started() {
        let recorder = MetricsRecorder::new();
        recorder.record_recording(true);
        recorder.record_recording(false);
        recorder.record_discarded(3);
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.recordings_started, 2);
        assert_eq!(snapshot.recordings_failed, 1);
        assert_eq!(snapshot.triggers_discarded, 3);
    }
}
