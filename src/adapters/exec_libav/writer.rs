//! Encode/mux side of the FFmpeg toolkit

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::{self, Pixel, Sample};
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame;
use ffmpeg_next::{codec, encoder, ffi, ChannelLayout, Dictionary, Packet, Rational};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info, warn};

use super::{
    AudioSample, LibavSample, LibavToolkit, LibavTrackInput, StatusCell, VideoSample, WriterCommand,
};
use crate::domain::errors::DomainError;
use crate::domain::model::{
    AudioOutputConfig, OutputTrackConfig, ScalingMode, TrackKind, VideoOutputConfig,
};
use crate::ports::{AssetWriter, OpenedWriter, WriterStatus};

/// Handle to a mux thread
pub struct LibavWriter {
    status: Arc<StatusCell<WriterStatus>>,
    error: Arc<Mutex<Option<DomainError>>>,
    tx: mpsc::UnboundedSender<WriterCommand>,
    credits: TrackCredits,
    closing: AtomicBool,
}

impl LibavWriter {
    fn new(
        status: Arc<StatusCell<WriterStatus>>,
        error: Arc<Mutex<Option<DomainError>>>,
        tx: mpsc::UnboundedSender<WriterCommand>,
        credits: TrackCredits,
    ) -> Self {
        Self {
            status,
            error,
            tx,
            credits,
            closing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AssetWriter for LibavWriter {
    fn status(&self) -> WriterStatus {
        self.status.get()
    }

    fn error(&self) -> Option<DomainError> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    fn start_writing(&self) -> bool {
        self.status.transition(WriterStatus::Unknown, WriterStatus::Writing)
    }

    async fn finish_writing(&self) {
        // Finishing and cancelling each claim the writer once; the loser backs off
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.status.get() != WriterStatus::Writing {
            return;
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Finish(reply_tx)).is_err() {
            return;
        }
        let _ = reply_rx.await;
    }

    fn cancel_writing(&self) {
        // Once finishing has started the container is completed regardless
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.status.transition(WriterStatus::Writing, WriterStatus::Cancelled)
            || self.status.transition(WriterStatus::Unknown, WriterStatus::Cancelled);
        if cancelled {
            debug!("Writer cancelled");
            self.credits.close();
            let _ = self.tx.send(WriterCommand::Cancel);
        }
    }
}

/// Per-track backpressure: one credit per sample in flight
#[derive(Clone)]
struct TrackCredits {
    video: Arc<Semaphore>,
    audio: Arc<Semaphore>,
}

impl TrackCredits {
    fn new(depth: usize) -> Self {
        Self {
            video: Arc::new(Semaphore::new(depth)),
            audio: Arc::new(Semaphore::new(depth)),
        }
    }

    fn of(&self, kind: TrackKind) -> &Arc<Semaphore> {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }

    fn close(&self) {
        self.video.close();
        self.audio.close();
    }
}

/// Spawn the mux thread and wait for stream registration
pub(super) async fn open(
    destination: &Path,
    config: &OutputTrackConfig,
    channel_depth: usize,
) -> Result<OpenedWriter<LibavToolkit>, DomainError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let status = Arc::new(StatusCell::new(WriterStatus::Unknown));
    let error = Arc::new(Mutex::new(None));
    let credits = TrackCredits::new(channel_depth.max(1));

    let job = MuxJob {
        destination: destination.to_path_buf(),
        config: config.clone(),
        rx,
        status: status.clone(),
        error: error.clone(),
        credits: credits.clone(),
    };
    thread::Builder::new()
        .name("video-compress-mux".to_string())
        .spawn(move || job.run(ready_tx))
        .map_err(|e| DomainError::IoFailure(format!("Failed to spawn writer thread: {}", e)))?;

    ready_rx
        .await
        .map_err(|_| DomainError::IoFailure("Writer thread exited during setup".to_string()))??;

    let video = LibavTrackInput::new(
        TrackKind::Video,
        tx.clone(),
        credits.video.clone(),
        status.clone(),
    );
    let audio = config.audio.as_ref().map(|_| {
        LibavTrackInput::new(
            TrackKind::Audio,
            tx.clone(),
            credits.audio.clone(),
            status.clone(),
        )
    });

    Ok(OpenedWriter {
        writer: LibavWriter::new(status, error, tx, credits),
        video,
        audio,
    })
}

struct MuxJob {
    destination: PathBuf,
    config: OutputTrackConfig,
    rx: mpsc::UnboundedReceiver<WriterCommand>,
    status: Arc<StatusCell<WriterStatus>>,
    error: Arc<Mutex<Option<DomainError>>>,
    credits: TrackCredits,
}

/// Encoders and output context, owned by the mux thread
struct Muxer {
    octx: Option<format::context::Output>,
    video: VideoEncoder,
    audio: Option<AudioEncoder>,
    destination: PathBuf,
}

impl MuxJob {
    fn run(mut self, ready: oneshot::Sender<Result<(), DomainError>>) {
        let mut muxer = match Muxer::create(&self.destination, &self.config) {
            Ok(muxer) => muxer,
            Err(e) => {
                let _ = std::fs::remove_file(&self.destination);
                let _ = ready.send(Err(e));
                return;
            }
        };
        if ready.send(Ok(())).is_err() {
            muxer.discard();
            return;
        }

        let mut failed = false;
        loop {
            let Some(command) = self.rx.blocking_recv() else {
                // Every handle dropped without finishing
                muxer.discard();
                return;
            };
            match command {
                WriterCommand::Append(kind, sample) => {
                    if !failed && self.status.get() == WriterStatus::Writing {
                        if let Err(e) = muxer.append(sample) {
                            failed = true;
                            self.fail(e);
                        }
                    }
                    self.credits.of(kind).add_permits(1);
                }
                WriterCommand::EndOfTrack(kind) => {
                    if !failed && self.status.get() == WriterStatus::Writing {
                        if let Err(e) = muxer.end_track(kind) {
                            failed = true;
                            self.fail(e);
                        }
                    }
                }
                WriterCommand::Finish(reply) => {
                    if !failed && self.status.get() == WriterStatus::Writing {
                        match muxer.finalize() {
                            Ok(()) => {
                                self.status
                                    .transition(WriterStatus::Writing, WriterStatus::Completed);
                                info!("Output finalized: {}", self.destination.display());
                            }
                            Err(e) => {
                                self.fail(e);
                                muxer.discard();
                            }
                        }
                    } else {
                        muxer.discard();
                    }
                    let _ = reply.send(());
                    return;
                }
                WriterCommand::Cancel => {
                    muxer.discard();
                    return;
                }
            }
        }
    }

    fn fail(&self, error: DomainError) {
        warn!("Writer failed: {}", error);
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(error);
        }
        self.status.transition(WriterStatus::Writing, WriterStatus::Failed);
        self.credits.close();
    }
}

impl Muxer {
    fn create(destination: &Path, config: &OutputTrackConfig) -> Result<Self, DomainError> {
        let mut octx = format::output(&destination).map_err(|e| {
            DomainError::IoFailure(format!("Failed to create {}: {}", destination.display(), e))
        })?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let mut video = VideoEncoder::new(&mut octx, &config.video, global_header)?;
        let mut audio = match &config.audio {
            Some(audio) => Some(AudioEncoder::new(&mut octx, audio, global_header)?),
            None => None,
        };

        if let Some(transform) = &config.video.transform {
            attach_display_matrix(&mut octx, video.stream_index, &transform.to_display_matrix())?;
        }

        octx.write_header()
            .map_err(|e| DomainError::IoFailure(format!("Failed to write header: {}", e)))?;

        // The muxer may adjust stream time bases while writing the header
        if let Some(stream) = octx.stream(video.stream_index) {
            video.ost_time_base = stream.time_base();
        }
        if let Some(audio) = audio.as_mut() {
            if let Some(stream) = octx.stream(audio.stream_index) {
                audio.ost_time_base = stream.time_base();
            }
        }

        Ok(Self {
            octx: Some(octx),
            video,
            audio,
            destination: destination.to_path_buf(),
        })
    }

    fn output(&mut self) -> Result<&mut format::context::Output, DomainError> {
        self.octx
            .as_mut()
            .ok_or_else(|| DomainError::IoFailure("Output already closed".to_string()))
    }

    fn append(&mut self, sample: LibavSample) -> Result<(), DomainError> {
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| DomainError::IoFailure("Output already closed".to_string()))?;
        match sample {
            LibavSample::Video(video) => self.video.encode(octx, video),
            LibavSample::Audio(audio) => match self.audio.as_mut() {
                Some(encoder) => encoder.encode(octx, audio),
                None => Ok(()),
            },
        }
    }

    fn end_track(&mut self, kind: TrackKind) -> Result<(), DomainError> {
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| DomainError::IoFailure("Output already closed".to_string()))?;
        match kind {
            TrackKind::Video => self.video.flush(octx),
            TrackKind::Audio => match self.audio.as_mut() {
                Some(encoder) => encoder.flush(octx),
                None => Ok(()),
            },
        }
    }

    fn finalize(&mut self) -> Result<(), DomainError> {
        self.end_track(TrackKind::Video)?;
        self.end_track(TrackKind::Audio)?;
        self.output()?
            .write_trailer()
            .map_err(|e| DomainError::IoFailure(format!("Failed to write trailer: {}", e)))?;
        self.octx = None;
        Ok(())
    }

    /// Close the output and remove the partial file
    fn discard(&mut self) {
        if self.octx.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.destination) {
                debug!("Could not remove partial output: {}", e);
            }
        }
    }
}

struct VideoEncoder {
    encoder: encoder::Video,
    stream_index: usize,
    time_base: Rational,
    ost_time_base: Rational,
    width: u32,
    height: u32,
    frame_rate: u32,
    scaling: ScalingMode,
    scaler: Option<CachedScaler>,
    next_pts: i64,
    flushed: bool,
}

struct CachedScaler {
    context: scaling::Context,
    source: (Pixel, u32, u32),
    target: (u32, u32),
}

impl VideoEncoder {
    fn new(
        octx: &mut format::context::Output,
        config: &VideoOutputConfig,
        global_header: bool,
    ) -> Result<Self, DomainError> {
        let codec = encoder::find(codec::Id::H264)
            .ok_or_else(|| DomainError::IoFailure("H.264 encoder not available".to_string()))?;
        let time_base = Rational::new(1, config.frame_rate as i32);

        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| DomainError::IoFailure(format!("Failed to add video stream: {}", e)))?;
        let stream_index = ost.index();

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| DomainError::IoFailure(format!("Failed to create video encoder: {}", e)))?;
        enc.set_width(config.width);
        enc.set_height(config.height);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(time_base);
        enc.set_frame_rate(Some(Rational::new(config.frame_rate as i32, 1)));
        enc.set_bit_rate(config.bit_rate as usize);
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        opts.set("profile", "high");
        let encoder = enc
            .open_as_with(codec, opts)
            .map_err(|e| DomainError::IoFailure(format!("Failed to open H.264 encoder: {}", e)))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);

        Ok(Self {
            encoder,
            stream_index,
            time_base,
            ost_time_base: time_base,
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
            scaling: config.scaling,
            scaler: None,
            next_pts: 0,
            flushed: false,
        })
    }

    fn encode(
        &mut self,
        octx: &mut format::context::Output,
        sample: VideoSample,
    ) -> Result<(), DomainError> {
        // Frames landing on an already used output slot are dropped
        let pts = (sample.time * self.frame_rate as f64).round() as i64;
        if pts < self.next_pts {
            return Ok(());
        }
        self.next_pts = pts + 1;

        let mut output = self.fit(&sample.frame)?;
        output.set_pts(Some(pts));

        self.encoder
            .send_frame(&output)
            .map_err(|e| DomainError::IoFailure(format!("Video encode failed: {}", e)))?;
        self.drain(octx)
    }

    /// Scale a decoded frame into the output geometry
    fn fit(&mut self, source: &frame::Video) -> Result<frame::Video, DomainError> {
        let key = (source.format(), source.width(), source.height());
        let target = match self.scaling {
            ScalingMode::Resize => (self.width, self.height),
            ScalingMode::ResizeAspectFill => {
                cover_size(source.width(), source.height(), self.width, self.height)
            }
        };

        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.source != key || s.target != target);
        if stale {
            let context = scaling::Context::get(
                key.0,
                key.1,
                key.2,
                Pixel::YUV420P,
                target.0,
                target.1,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| DomainError::IoFailure(format!("Failed to create scaler: {}", e)))?;
            self.scaler = Some(CachedScaler {
                context,
                source: key,
                target,
            });
        }

        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| DomainError::IoFailure("Scaler unavailable".to_string()))?;
        let mut scaled = frame::Video::empty();
        scaler
            .context
            .run(source, &mut scaled)
            .map_err(|e| DomainError::IoFailure(format!("Scaling failed: {}", e)))?;

        if target == (self.width, self.height) {
            Ok(scaled)
        } else {
            Ok(crop_center(&scaled, self.width, self.height))
        }
    }

    fn drain(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, self.ost_time_base);
            packet
                .write_interleaved(octx)
                .map_err(|e| DomainError::IoFailure(format!("Failed to write video packet: {}", e)))?;
        }
        Ok(())
    }

    fn flush(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        self.encoder
            .send_eof()
            .map_err(|e| DomainError::IoFailure(format!("Video flush failed: {}", e)))?;
        self.drain(octx)
    }
}

/// Smallest even size that covers `width x height` with the source aspect kept
fn cover_size(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (width, height);
    }
    let scale = (width as f64 / src_w as f64).max(height as f64 / src_h as f64);
    let even_up = |v: f64, min: u32| -> u32 {
        let v = (v.ceil() as u32).max(min);
        v + (v % 2)
    };
    (even_up(src_w as f64 * scale, width), even_up(src_h as f64 * scale, height))
}

/// Copy the centered `width x height` region of a YUV 4:2:0 frame
fn crop_center(source: &frame::Video, width: u32, height: u32) -> frame::Video {
    let mut target = frame::Video::new(Pixel::YUV420P, width, height);
    let x0 = ((source.width() - width) / 2) & !1;
    let y0 = ((source.height() - height) / 2) & !1;

    for plane in 0..3 {
        let (px, py, pw, ph) = if plane == 0 {
            (x0, y0, width, height)
        } else {
            (x0 / 2, y0 / 2, (width + 1) / 2, (height + 1) / 2)
        };
        let src_stride = source.stride(plane);
        let dst_stride = target.stride(plane);
        let src = source.data(plane);
        let dst = target.data_mut(plane);
        for row in 0..ph as usize {
            let from = (py as usize + row) * src_stride + px as usize;
            let to = row * dst_stride;
            dst[to..to + pw as usize].copy_from_slice(&src[from..from + pw as usize]);
        }
    }
    target
}

/// Mono F32 planar sample queue feeding fixed-size encoder frames
struct AudioFifo {
    samples: Vec<f32>,
}

impl AudioFifo {
    fn new() -> Self {
        Self { samples: Vec::new() }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn push(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Pop `n` samples, zero-padding the tail on the final flush
    fn pop_frame(&mut self, n: usize, rate: u32, pts: i64) -> frame::Audio {
        let available = self.samples.len().min(n);
        let mut out = frame::Audio::new(Sample::F32(SampleType::Planar), n, ChannelLayout::MONO);
        out.set_rate(rate);
        out.set_pts(Some(pts));

        let plane = out.plane_mut::<f32>(0);
        plane[..available].copy_from_slice(&self.samples[..available]);
        plane[available..].fill(0.0);

        self.samples.drain(..available);
        out
    }
}

struct AudioEncoder {
    encoder: encoder::Audio,
    stream_index: usize,
    time_base: Rational,
    ost_time_base: Rational,
    sample_rate: u32,
    frame_size: usize,
    fifo: AudioFifo,
    next_pts: i64,
    flushed: bool,
}

impl AudioEncoder {
    fn new(
        octx: &mut format::context::Output,
        config: &AudioOutputConfig,
        global_header: bool,
    ) -> Result<Self, DomainError> {
        let codec = encoder::find(codec::Id::AAC)
            .ok_or_else(|| DomainError::IoFailure("AAC encoder not available".to_string()))?;
        let time_base = Rational::new(1, config.sample_rate as i32);

        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| DomainError::IoFailure(format!("Failed to add audio stream: {}", e)))?;
        let stream_index = ost.index();

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(|e| DomainError::IoFailure(format!("Failed to create audio encoder: {}", e)))?;
        enc.set_rate(config.sample_rate as i32);
        enc.set_channel_layout(ChannelLayout::MONO);
        enc.set_format(Sample::F32(SampleType::Planar));
        enc.set_bit_rate(config.bit_rate as usize);
        enc.set_time_base(time_base);
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = enc
            .open_as(codec)
            .map_err(|e| DomainError::IoFailure(format!("Failed to open AAC encoder: {}", e)))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        let frame_size = (encoder.frame_size() as usize).max(1024);

        Ok(Self {
            encoder,
            stream_index,
            time_base,
            ost_time_base: time_base,
            sample_rate: config.sample_rate,
            frame_size,
            fifo: AudioFifo::new(),
            next_pts: 0,
            flushed: false,
        })
    }

    fn encode(
        &mut self,
        octx: &mut format::context::Output,
        sample: AudioSample,
    ) -> Result<(), DomainError> {
        self.fifo.push(&sample.samples);
        self.drain_fifo(octx, false)
    }

    fn drain_fifo(
        &mut self,
        octx: &mut format::context::Output,
        flush: bool,
    ) -> Result<(), DomainError> {
        while self.fifo.len() >= self.frame_size || (flush && self.fifo.len() > 0) {
            let frame = self
                .fifo
                .pop_frame(self.frame_size, self.sample_rate, self.next_pts);
            self.next_pts += self.frame_size as i64;
            self.encoder
                .send_frame(&frame)
                .map_err(|e| DomainError::IoFailure(format!("Audio encode failed: {}", e)))?;
            self.drain_packets(octx)?;
        }
        Ok(())
    }

    fn drain_packets(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, self.ost_time_base);
            packet
                .write_interleaved(octx)
                .map_err(|e| DomainError::IoFailure(format!("Failed to write audio packet: {}", e)))?;
        }
        Ok(())
    }

    fn flush(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        self.drain_fifo(octx, true)?;
        self.encoder
            .send_eof()
            .map_err(|e| DomainError::IoFailure(format!("Audio flush failed: {}", e)))?;
        self.drain_packets(octx)
    }
}

/// Store the playback transform as display-matrix side data on a stream
fn attach_display_matrix(
    octx: &mut format::context::Output,
    index: usize,
    matrix: &[i32; 9],
) -> Result<(), DomainError> {
    let size = std::mem::size_of::<[i32; 9]>();
    // SAFETY: `index` was returned by `add_stream` on this context, and the
    // side data buffer is allocated by libavcodec with `size` bytes.
    unsafe {
        let stream = *(*octx.as_mut_ptr()).streams.add(index);
        let par = (*stream).codecpar;
        let side = ffi::av_packet_side_data_new(
            &mut (*par).coded_side_data,
            &mut (*par).nb_coded_side_data,
            ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
            size,
            0,
        );
        if side.is_null() {
            return Err(DomainError::IoFailure(
                "Failed to allocate display matrix".to_string(),
            ));
        }
        std::ptr::copy_nonoverlapping(matrix.as_ptr() as *const u8, (*side).data, size);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_size_landscape_into_landscape() {
        assert_eq!(cover_size(1920, 1080, 1280, 720), (1280, 720));
    }

    #[test]
    fn test_cover_size_crops_wider_source() {
        // 4:3 source into 16:9 box: width matches, height overflows
        let (w, h) = cover_size(640, 480, 1280, 720);
        assert_eq!(w, 1280);
        assert!(h >= 720);
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn test_cover_size_portrait_source_into_landscape() {
        let (w, h) = cover_size(1080, 1920, 1280, 720);
        assert_eq!(w, 1280);
        assert!(h > 720);
    }

    fn writer_with_channel() -> (LibavWriter, mpsc::UnboundedReceiver<WriterCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = LibavWriter::new(
            Arc::new(StatusCell::new(WriterStatus::Unknown)),
            Arc::new(Mutex::new(None)),
            tx,
            TrackCredits::new(2),
        );
        (writer, rx)
    }

    #[tokio::test]
    async fn test_cancel_while_finishing_keeps_writing() {
        let (writer, mut rx) = writer_with_channel();
        let writer = Arc::new(writer);
        assert!(writer.start_writing());

        let finisher = {
            let writer = writer.clone();
            tokio::spawn(async move { writer.finish_writing().await })
        };
        let reply = match rx.recv().await {
            Some(WriterCommand::Finish(reply)) => reply,
            _ => panic!("expected a finish command"),
        };

        writer.cancel_writing();
        assert_eq!(writer.status(), WriterStatus::Writing);
        assert!(rx.try_recv().is_err());

        reply.send(()).unwrap();
        finisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_after_cancel_sends_nothing() {
        let (writer, mut rx) = writer_with_channel();
        assert!(writer.start_writing());

        writer.cancel_writing();
        assert_eq!(writer.status(), WriterStatus::Cancelled);
        assert!(matches!(rx.recv().await, Some(WriterCommand::Cancel)));

        writer.finish_writing().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(writer.status(), WriterStatus::Cancelled);
    }

    #[test]
    fn test_credits_close_both_tracks() {
        let credits = TrackCredits::new(2);
        credits.close();
        assert!(credits.of(TrackKind::Video).is_closed());
        assert!(credits.of(TrackKind::Audio).is_closed());
    }
}
