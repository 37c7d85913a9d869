//! Sample-level transcode pipeline
//!
//! One run opens a reader over the source and a writer over the destination,
//! drives one pump task per active track and resolves to exactly one terminal
//! result once both pumps have joined.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::cancel::CancellationFlag;
use super::progress::{ProgressAggregator, ProgressCallback};
use crate::domain::errors::DomainError;
use crate::domain::model::TrackKind;
use crate::domain::rules::TranscodePlan;
use crate::ports::*;

/// Terminal state of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    Completed,
    Cancelled,
    Failed(DomainError),
}

/// Per-track counters reported by a pump task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub appended: u64,
    pub units: u64,
}

/// Reader/writer state machine over a [`MediaToolkit`]
pub struct TranscodePipeline<T: MediaToolkit> {
    toolkit: Arc<T>,
    fs: Arc<dyn FsPort>,
    channel_depth: usize,
}

impl<T: MediaToolkit> TranscodePipeline<T> {
    pub fn new(toolkit: Arc<T>, fs: Arc<dyn FsPort>, channel_depth: usize) -> Self {
        Self {
            toolkit,
            fs,
            channel_depth: channel_depth.max(1),
        }
    }

    /// Run the plan to a terminal state
    pub async fn run(
        &self,
        plan: &TranscodePlan,
        cancel: &CancellationFlag,
        progress: Arc<dyn ProgressCallback>,
    ) -> PipelineResult {
        if cancel.is_cancelled() {
            info!("Cancelled before setup, no output created");
            return PipelineResult::Cancelled;
        }

        if let Err(e) = self.clear_destination(&plan.destination).await {
            return PipelineResult::Failed(e);
        }

        let setup = ReaderSetup {
            time_range: plan.time_range,
            cadence_ratio: plan.cadence.ratio,
            include_audio: plan.has_audio(),
            channel_depth: self.channel_depth,
        };
        let opened_reader = match self.toolkit.open_reader(&plan.source, setup).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Reader setup failed: {}", e);
                return PipelineResult::Failed(e);
            }
        };
        let opened_writer = match self
            .toolkit
            .open_writer(&plan.destination, &plan.output, self.channel_depth)
            .await
        {
            Ok(w) => w,
            Err(e) => {
                warn!("Writer setup failed: {}", e);
                opened_reader.reader.cancel_reading();
                return PipelineResult::Failed(e);
            }
        };

        let reader = Arc::new(opened_reader.reader);
        let writer = Arc::new(opened_writer.writer);

        let tracks = match pair_tracks::<T>(
            opened_reader.video,
            opened_writer.video,
            opened_reader.audio,
            opened_writer.audio,
        ) {
            Ok(tracks) => tracks,
            Err(e) => {
                reader.cancel_reading();
                writer.cancel_writing();
                return PipelineResult::Failed(e);
            }
        };

        if !reader.start_reading() {
            writer.cancel_writing();
            return PipelineResult::Failed(DomainError::IoFailure(
                "Reader failed to start".to_string(),
            ));
        }
        if !writer.start_writing() {
            reader.cancel_reading();
            let error = writer
                .error()
                .unwrap_or_else(|| DomainError::IoFailure("Writer failed to start".to_string()));
            return PipelineResult::Failed(error);
        }

        if cancel.is_cancelled() {
            info!("Cancelled during setup");
            reader.cancel_reading();
            writer.cancel_writing();
            return PipelineResult::Cancelled;
        }

        let aggregator = Arc::new(ProgressAggregator::new(
            plan.totals,
            progress,
            cancel.clone(),
        ));

        // Turns a cancel request into reader/writer abort while the pumps run
        let watcher = {
            let cancel = cancel.clone();
            let reader = reader.clone();
            let writer = writer.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                debug!("Cancel requested, aborting reader and writer");
                reader.cancel_reading();
                writer.cancel_writing();
            })
        };

        let step = plan.cadence.step as u64;
        let mut pumps = JoinSet::new();
        for (kind, output, input) in tracks {
            pumps.spawn(pump::<T>(
                kind,
                output,
                input,
                aggregator.clone(),
                cancel.clone(),
                step,
            ));
        }

        let mut pump_failure = None;
        while let Some(joined) = pumps.join_next().await {
            match joined {
                Ok((kind, report)) => {
                    debug!("{} pump finished: {} samples appended", kind, report.appended);
                }
                Err(e) => {
                    warn!("Pump task failed: {}", e);
                    pump_failure = Some(DomainError::IoFailure(format!("Pump task failed: {}", e)));
                }
            }
        }
        watcher.abort();

        self.teardown(plan, reader.as_ref(), writer.as_ref(), &aggregator, cancel, pump_failure)
            .await
    }

    async fn clear_destination(&self, destination: &Path) -> Result<(), DomainError> {
        if self.fs.file_exists(destination).await {
            debug!("Removing existing destination {}", destination.display());
            self.fs.delete_file(destination).await?;
        }
        Ok(())
    }

    async fn teardown(
        &self,
        plan: &TranscodePlan,
        reader: &T::Reader,
        writer: &T::Writer,
        aggregator: &ProgressAggregator,
        cancel: &CancellationFlag,
        pump_failure: Option<DomainError>,
    ) -> PipelineResult {
        if reader.status() == ReaderStatus::Reading {
            reader.cancel_reading();
        }

        if let Some(error) = pump_failure {
            writer.cancel_writing();
            return PipelineResult::Failed(error);
        }

        if reader.status() == ReaderStatus::Failed && !cancel.is_cancelled() {
            writer.cancel_writing();
            return PipelineResult::Failed(DomainError::IoFailure(
                "Reader failed while decoding the source".to_string(),
            ));
        }

        match writer.status() {
            WriterStatus::Writing => {
                writer.finish_writing().await;
            }
            WriterStatus::Cancelled => return PipelineResult::Cancelled,
            WriterStatus::Failed => return PipelineResult::Failed(writer_error(writer)),
            WriterStatus::Completed => {}
            WriterStatus::Unknown => {
                return PipelineResult::Failed(DomainError::IoFailure(
                    "Writer was never started".to_string(),
                ))
            }
        }

        match writer.status() {
            WriterStatus::Completed => {}
            WriterStatus::Cancelled => return PipelineResult::Cancelled,
            _ => return PipelineResult::Failed(writer_error(writer)),
        }

        if cancel.is_cancelled() {
            info!("Cancelled after finalize, discarding {}", plan.destination.display());
            if let Err(e) = self.fs.delete_file(&plan.destination).await {
                warn!("Failed to discard cancelled output: {}", e);
            }
            cancel.reset();
            return PipelineResult::Cancelled;
        }

        aggregator.finish();
        info!("Transcode completed: {}", plan.destination.display());
        PipelineResult::Completed
    }
}

type TrackPair<T> = (
    TrackKind,
    <T as MediaToolkit>::Output,
    <T as MediaToolkit>::Input,
);

fn pair_tracks<T: MediaToolkit>(
    video_out: T::Output,
    video_in: T::Input,
    audio_out: Option<T::Output>,
    audio_in: Option<T::Input>,
) -> Result<Vec<TrackPair<T>>, DomainError> {
    let mut tracks = vec![(TrackKind::Video, video_out, video_in)];
    match (audio_out, audio_in) {
        (Some(output), Some(input)) => tracks.push((TrackKind::Audio, output, input)),
        (None, None) => {}
        _ => {
            return Err(DomainError::IoFailure(
                "Audio track registered on only one side".to_string(),
            ))
        }
    }
    Ok(tracks)
}

fn writer_error<W: AssetWriter + ?Sized>(writer: &W) -> DomainError {
    writer
        .error()
        .unwrap_or_else(|| DomainError::IoFailure("Writer failed".to_string()))
}

/// Move samples from one track output to its input until the track drains,
/// the writer stops accepting data or cancellation is requested
async fn pump<T: MediaToolkit>(
    kind: TrackKind,
    mut output: T::Output,
    mut input: T::Input,
    aggregator: Arc<ProgressAggregator>,
    cancel: CancellationFlag,
    video_step: u64,
) -> (TrackKind, PumpReport) {
    let mut report = PumpReport::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ready = input.ready_for_more_data() => ready,
        };
        if !ready {
            debug!("{} input no longer accepts data", kind);
            break;
        }

        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sample = output.copy_next_sample() => sample,
        };
        let Some(sample) = sample else {
            break;
        };

        let count = sample.sample_count();
        if !input.append(sample).await {
            debug!("{} append rejected", kind);
            break;
        }
        report.appended += 1;

        match kind {
            TrackKind::Video => {
                let units = count * video_step;
                report.units += units;
                aggregator.record_video(units);
            }
            TrackKind::Audio => {
                report.units += count;
                aggregator.record_audio(count);
            }
        }
    }

    input.mark_as_finished();
    (kind, report)
}
