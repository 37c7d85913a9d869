//! Demux/decode side of the FFmpeg toolkit

use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::frame;
use ffmpeg_next::{codec, decoder, ChannelLayout, Rational};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{AudioSample, LibavSample, LibavToolkit, LibavTrackOutput, StatusCell, VideoSample};
use crate::domain::errors::DomainError;
use crate::domain::model::{TimeRange, AUDIO_SAMPLE_RATE};
use crate::ports::{AssetReader, OpenedReader, ReaderSetup, ReaderStatus};

/// Handle to a demux thread
pub struct LibavReader {
    status: Arc<StatusCell<ReaderStatus>>,
    start_tx: Mutex<Option<std_mpsc::Sender<()>>>,
}

impl AssetReader for LibavReader {
    fn status(&self) -> ReaderStatus {
        self.status.get()
    }

    fn start_reading(&self) -> bool {
        if !self.status.transition(ReaderStatus::Unknown, ReaderStatus::Reading) {
            return false;
        }
        match self.start_tx.lock() {
            Ok(mut start) => start.take().map(|tx| tx.send(()).is_ok()).unwrap_or(false),
            Err(_) => false,
        }
    }

    fn cancel_reading(&self) {
        let cancelled = self.status.transition(ReaderStatus::Reading, ReaderStatus::Cancelled)
            || self.status.transition(ReaderStatus::Unknown, ReaderStatus::Cancelled);
        if cancelled {
            debug!("Reader cancelled");
        }
        // Wakes a thread still waiting for the start signal
        if let Ok(mut start) = self.start_tx.lock() {
            start.take();
        }
    }
}

/// Spawn the demux thread and wait for its track registration
pub(super) async fn open(
    source: &Path,
    setup: ReaderSetup,
) -> Result<OpenedReader<LibavToolkit>, DomainError> {
    let depth = setup.channel_depth.max(1);
    let (video_tx, video_rx) = mpsc::channel(depth);
    let (audio_tx, audio_rx) = mpsc::channel(depth);
    let (ready_tx, ready_rx) = oneshot::channel();
    let (start_tx, start_rx) = std_mpsc::channel();
    let status = Arc::new(StatusCell::new(ReaderStatus::Unknown));

    let job = DemuxJob {
        source: source.to_path_buf(),
        setup,
        status: status.clone(),
        video_tx,
        audio_tx,
    };
    thread::Builder::new()
        .name("video-compress-demux".to_string())
        .spawn(move || job.run(ready_tx, start_rx))
        .map_err(|e| DomainError::IoFailure(format!("Failed to spawn reader thread: {}", e)))?;

    let has_audio = ready_rx
        .await
        .map_err(|_| DomainError::IoFailure("Reader thread exited during setup".to_string()))??;

    Ok(OpenedReader {
        reader: LibavReader {
            status,
            start_tx: Mutex::new(Some(start_tx)),
        },
        video: LibavTrackOutput { rx: video_rx },
        audio: has_audio.then_some(LibavTrackOutput { rx: audio_rx }),
    })
}

struct DemuxJob {
    source: PathBuf,
    setup: ReaderSetup,
    status: Arc<StatusCell<ReaderStatus>>,
    video_tx: mpsc::Sender<LibavSample>,
    audio_tx: mpsc::Sender<LibavSample>,
}

struct VideoTrack {
    index: usize,
    decoder: decoder::Video,
    time_base: f64,
    /// Frames seen inside the time range, before decimation
    seen: u64,
    done: bool,
}

struct AudioTrack {
    index: usize,
    decoder: decoder::Audio,
    resampler: resampling::Context,
    time_base: f64,
    done: bool,
}

impl DemuxJob {
    fn run(
        self,
        ready: oneshot::Sender<Result<bool, DomainError>>,
        start: std_mpsc::Receiver<()>,
    ) {
        let (mut ictx, mut video, mut audio) = match self.prepare() {
            Ok(parts) => parts,
            Err(e) => {
                self.status.transition(ReaderStatus::Unknown, ReaderStatus::Failed);
                let _ = ready.send(Err(e));
                return;
            }
        };
        if ready.send(Ok(audio.is_some())).is_err() {
            return;
        }

        // Sender dropped means the reader was cancelled before starting
        if start.recv().is_err() {
            debug!("Reader dropped before start");
            return;
        }

        match self.demux(&mut ictx, &mut video, &mut audio) {
            Ok(()) => {
                self.status.transition(ReaderStatus::Reading, ReaderStatus::Completed);
            }
            Err(e) => {
                warn!("Reader failed: {}", e);
                self.status.transition(ReaderStatus::Reading, ReaderStatus::Failed);
            }
        }
    }

    fn prepare(
        &self,
    ) -> Result<
        (
            ffmpeg_next::format::context::Input,
            VideoTrack,
            Option<AudioTrack>,
        ),
        DomainError,
    > {
        let mut ictx = ffmpeg_next::format::input(&self.source).map_err(|e| {
            DomainError::UnsupportedSource(format!("Failed to open {}: {}", self.source.display(), e))
        })?;

        let video = {
            let stream = ictx
                .streams()
                .best(Type::Video)
                .ok_or_else(|| DomainError::UnsupportedSource("Source has no video track".to_string()))?;
            let decoder = codec::context::Context::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().video())
                .map_err(|e| DomainError::IoFailure(format!("Failed to open video decoder: {}", e)))?;
            VideoTrack {
                index: stream.index(),
                decoder,
                time_base: rational_to_f64(stream.time_base()),
                seen: 0,
                done: false,
            }
        };

        let audio = if self.setup.include_audio {
            match ictx.streams().best(Type::Audio) {
                Some(stream) => {
                    let mut decoder = codec::context::Context::from_parameters(stream.parameters())
                        .and_then(|ctx| ctx.decoder().audio())
                        .map_err(|e| {
                            DomainError::IoFailure(format!("Failed to open audio decoder: {}", e))
                        })?;
                    if decoder.channel_layout().is_empty() {
                        decoder.set_channel_layout(ChannelLayout::default(decoder.channels() as i32));
                    }
                    let resampler = decoder
                        .resampler(
                            Sample::F32(SampleType::Planar),
                            ChannelLayout::MONO,
                            AUDIO_SAMPLE_RATE,
                        )
                        .map_err(|e| {
                            DomainError::IoFailure(format!("Failed to create resampler: {}", e))
                        })?;
                    Some(AudioTrack {
                        index: stream.index(),
                        decoder,
                        resampler,
                        time_base: rational_to_f64(stream.time_base()),
                        done: false,
                    })
                }
                None => None,
            }
        } else {
            None
        };

        let start = self.setup.time_range.start;
        if start > 0.0 {
            let ts = (start * ffmpeg_next::ffi::AV_TIME_BASE as f64) as i64;
            ictx.seek(ts, ..ts)
                .map_err(|e| DomainError::IoFailure(format!("Failed to seek source: {}", e)))?;
        }

        Ok((ictx, video, audio))
    }

    fn cancelled(&self) -> bool {
        self.status.get() != ReaderStatus::Reading
    }

    fn demux(
        &self,
        ictx: &mut ffmpeg_next::format::context::Input,
        video: &mut VideoTrack,
        audio: &mut Option<AudioTrack>,
    ) -> Result<(), DomainError> {
        let range = self.setup.time_range;
        let ratio = self.setup.cadence_ratio.max(1) as u64;
        let mut audio_open = audio.is_some();

        for (stream, packet) in ictx.packets() {
            if self.cancelled() {
                return Ok(());
            }
            if video.done && audio.as_ref().map_or(true, |a| a.done) {
                break;
            }

            if stream.index() == video.index && !video.done {
                // Per-packet decode errors are skipped; only setup failures are fatal
                if video.decoder.send_packet(&packet).is_err() {
                    continue;
                }
                if !self.drain_video(video, &range, ratio) {
                    return Ok(());
                }
            } else if let Some(track) = audio.as_mut() {
                if stream.index() == track.index && !track.done && audio_open {
                    if track.decoder.send_packet(&packet).is_err() {
                        continue;
                    }
                    audio_open = self.drain_audio(track, &range);
                }
            }
        }

        if self.cancelled() {
            return Ok(());
        }

        if !video.done {
            let _ = video.decoder.send_eof();
            self.drain_video(video, &range, ratio);
        }
        if let Some(track) = audio.as_mut() {
            if !track.done && audio_open {
                let _ = track.decoder.send_eof();
                self.drain_audio(track, &range);
            }
        }
        Ok(())
    }

    /// Returns false once the video consumer is gone
    fn drain_video(&self, video: &mut VideoTrack, range: &TimeRange, ratio: u64) -> bool {
        let mut decoded = frame::Video::empty();
        while video.decoder.receive_frame(&mut decoded).is_ok() {
            let ts = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
            let t = ts as f64 * video.time_base;
            if t < range.start {
                continue;
            }
            if t >= range.end() {
                video.done = true;
                return true;
            }
            let keep = video.seen % ratio == 0;
            video.seen += 1;
            if !keep {
                continue;
            }
            let sample = LibavSample::Video(VideoSample {
                frame: decoded.clone(),
                time: t - range.start,
            });
            if self.video_tx.blocking_send(sample).is_err() {
                video.done = true;
                return false;
            }
        }
        true
    }

    /// Returns false once the audio consumer is gone
    fn drain_audio(&self, track: &mut AudioTrack, range: &TimeRange) -> bool {
        let mut decoded = frame::Audio::empty();
        while track.decoder.receive_frame(&mut decoded).is_ok() {
            let ts = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
            let t = ts as f64 * track.time_base;
            if t >= range.end() {
                track.done = true;
                return true;
            }

            let mut resampled = frame::Audio::empty();
            if track.resampler.run(&decoded, &mut resampled).is_err() {
                continue;
            }
            let count = resampled.samples();
            if count == 0 {
                continue;
            }
            let pcm = &resampled.plane::<f32>(0)[..count];

            let rate = AUDIO_SAMPLE_RATE as f64;
            let first = ((range.start - t) * rate).round().max(0.0) as usize;
            let last = ((range.end() - t) * rate).round().max(0.0) as usize;
            let (first, last) = (first.min(count), last.min(count));
            if first >= last {
                continue;
            }

            let sample = LibavSample::Audio(AudioSample {
                samples: pcm[first..last].to_vec(),
                time: (t - range.start).max(0.0),
            });
            if self.audio_tx.blocking_send(sample).is_err() {
                track.done = true;
                return false;
            }
        }
        true
    }
}

fn rational_to_f64(value: Rational) -> f64 {
    if value.denominator() == 0 {
        0.0
    } else {
        value.numerator() as f64 / value.denominator() as f64
    }
}
