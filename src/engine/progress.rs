//! Progress aggregation and callback sinks

use std::io::Write;
use std::sync::{Arc, Mutex};

use super::cancel::CancellationFlag;
use crate::domain::rules::ExpectedTotals;

/// Progress callback trait for UI integration
pub trait ProgressCallback: Send + Sync {
    /// Overall progress in percent, 0.0 - 100.0
    fn on_progress(&self, percent: f64);

    /// Called once when the output is finalized
    fn on_complete(&self) {}

    /// Called once when a run is resolved as cancelled
    fn on_cancel(&self) {}

    /// Called once when a run fails
    fn on_error(&self, _error: &str) {}
}

/// Combines per-track counters into one progress signal
///
/// Counters live behind a mutex and the callback runs while it is held, so
/// ticks from the two pump loops are serialized.
pub struct ProgressAggregator {
    inner: Mutex<AggregatorInner>,
    callback: Arc<dyn ProgressCallback>,
    cancel: CancellationFlag,
}

struct AggregatorInner {
    processed_video: u64,
    processed_audio: u64,
    total_video: u64,
    total_audio: Option<u64>,
    last_percent: f64,
}

impl ProgressAggregator {
    pub fn new(
        totals: ExpectedTotals,
        callback: Arc<dyn ProgressCallback>,
        cancel: CancellationFlag,
    ) -> Self {
        let inner = AggregatorInner {
            processed_video: 0,
            processed_audio: 0,
            total_video: totals.video_frames.max(1),
            total_audio: totals.audio_frames.map(|t| t.max(1)),
            last_percent: 0.0,
        };
        Self {
            inner: Mutex::new(inner),
            callback,
            cancel,
        }
    }

    /// Credit video progress units
    pub fn record_video(&self, units: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.processed_video += units;
            self.emit(&mut inner);
        }
    }

    /// Credit audio samples
    pub fn record_audio(&self, samples: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.processed_audio += samples;
            self.emit(&mut inner);
        }
    }

    /// Final tick on natural completion
    pub fn finish(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if self.cancel.is_cancelled() {
                return;
            }
            inner.last_percent = 100.0;
            self.callback.on_progress(100.0);
        }
    }

    /// Last percentage forwarded to the callback
    pub fn last_percent(&self) -> f64 {
        self.inner.lock().map(|inner| inner.last_percent).unwrap_or(0.0)
    }

    /// Processed (video, audio) counters
    pub fn processed(&self) -> (u64, u64) {
        self.inner
            .lock()
            .map(|inner| (inner.processed_video, inner.processed_audio))
            .unwrap_or((0, 0))
    }

    fn emit(&self, inner: &mut AggregatorInner) {
        if self.cancel.is_cancelled() {
            return;
        }
        let video = inner.processed_video as f64 / inner.total_video as f64;
        let overall = match inner.total_audio {
            Some(total_audio) => {
                let audio = inner.processed_audio as f64 / total_audio as f64;
                (video + audio) / 2.0
            }
            None => video,
        };
        let percent = (overall * 100.0).clamp(0.0, 100.0);
        inner.last_percent = percent;
        self.callback.on_progress(percent);
    }
}

/// Text progress bar on stderr
pub struct ConsoleProgressCallback {
    bar_length: usize,
}

impl ConsoleProgressCallback {
    pub fn new() -> Self {
        Self { bar_length: 30 }
    }
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, percent: f64) {
        let filled = ((percent / 100.0) * self.bar_length as f64) as usize;
        let filled = filled.min(self.bar_length);
        let bar = "#".repeat(filled) + &"-".repeat(self.bar_length - filled);
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r[{}] {:>5.1}%", bar, percent);
        let _ = stderr.flush();
    }

    fn on_complete(&self) {
        eprintln!("\nCompleted");
    }

    fn on_cancel(&self) {
        eprintln!("\nCancelled");
    }

    fn on_error(&self, error: &str) {
        eprintln!("\nError: {}", error);
    }
}

/// JSON-lines progress events on stdout
pub struct JsonProgressCallback;

impl ProgressCallback for JsonProgressCallback {
    fn on_progress(&self, percent: f64) {
        let event = serde_json::json!({
            "event": "progress",
            "percent": percent,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_complete(&self) {
        let event = serde_json::json!({
            "event": "complete",
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_cancel(&self) {
        let event = serde_json::json!({
            "event": "cancel",
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_error(&self, error: &str) {
        let event = serde_json::json!({
            "event": "error",
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }
}

/// No-op progress callback for when progress tracking is disabled
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _percent: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingCallback {
        ticks: Mutex<Vec<f64>>,
    }

    impl RecordingCallback {
        fn ticks(&self) -> Vec<f64> {
            self.ticks.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for RecordingCallback {
        fn on_progress(&self, percent: f64) {
            self.ticks.lock().unwrap().push(percent);
        }
    }

    fn aggregator(
        video: u64,
        audio: Option<u64>,
    ) -> (ProgressAggregator, Arc<RecordingCallback>, CancellationFlag) {
        let callback = Arc::new(RecordingCallback::default());
        let cancel = CancellationFlag::new();
        let totals = ExpectedTotals {
            video_frames: video,
            audio_frames: audio,
        };
        (
            ProgressAggregator::new(totals, callback.clone(), cancel.clone()),
            callback,
            cancel,
        )
    }

    #[test]
    fn test_video_only_progress() {
        let (agg, callback, _) = aggregator(10, None);
        agg.record_video(5);
        assert_eq!(callback.ticks(), vec![50.0]);
    }

    #[test]
    fn test_video_and_audio_are_averaged() {
        let (agg, callback, _) = aggregator(300, Some(441_000));
        agg.record_video(150);
        agg.record_audio(0);
        assert_eq!(callback.ticks(), vec![25.0, 25.0]);

        agg.record_audio(441_000);
        assert_eq!(callback.ticks().last().copied(), Some(75.0));
        assert_eq!(agg.processed(), (150, 441_000));
    }

    #[test]
    fn test_ticks_are_clamped() {
        let (agg, callback, _) = aggregator(10, None);
        agg.record_video(25);
        assert_eq!(callback.ticks(), vec![100.0]);
    }

    #[test]
    fn test_zero_totals_treated_as_one() {
        let (agg, callback, _) = aggregator(0, Some(0));
        agg.record_video(1);
        assert_eq!(callback.ticks(), vec![50.0]);
    }

    #[test]
    fn test_no_ticks_after_cancel() {
        let (agg, callback, cancel) = aggregator(10, None);
        agg.record_video(1);
        cancel.cancel();
        agg.record_video(1);
        agg.finish();
        assert_eq!(callback.ticks(), vec![10.0]);
        // Counters still advance
        assert_eq!(agg.processed(), (2, 0));
    }

    #[test]
    fn test_finish_emits_hundred() {
        let (agg, callback, _) = aggregator(10, Some(10));
        agg.record_video(10);
        agg.finish();
        assert_eq!(callback.ticks(), vec![50.0, 100.0]);
        assert_eq!(agg.last_percent(), 100.0);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let (agg, callback, _) = aggregator(1000, Some(1000));
        let agg = Arc::new(agg);
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i == 0 {
                            agg.record_video(1);
                        } else {
                            agg.record_audio(1);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(agg.processed(), (1000, 1000));
        assert_eq!(callback.ticks().len(), 2000);
        assert_eq!(callback.ticks().last().copied(), Some(100.0));
    }
}
