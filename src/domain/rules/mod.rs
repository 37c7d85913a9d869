// Domain rules - Business logic and policies

use std::path::PathBuf;

use crate::domain::errors::*;
use crate::domain::model::*;


/// Builds the output track configuration for a request
pub trait CompressionStrategy: Send + Sync {
    /// Strategy identity
    fn kind(&self) -> StrategyKind;

    /// Derive output settings from the request and the source tracks
    fn build(
        &self,
        request: &TranscodeRequest,
        tracks: &SourceTracks,
    ) -> Result<OutputTrackConfig, DomainError>;
}

/// Explicit-bitrate strategy with a fixed 720p frame
#[derive(Debug, Clone)]
pub struct ManualStrategy {
    default_frame_rate: u32,
}

impl ManualStrategy {
    pub fn new(default_frame_rate: u32) -> Self {
        Self { default_frame_rate }
    }
}

impl Default for ManualStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

impl CompressionStrategy for ManualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Manual
    }

    fn build(
        &self,
        request: &TranscodeRequest,
        tracks: &SourceTracks,
    ) -> Result<OutputTrackConfig, DomainError> {
        let video = require_video(tracks)?;

        let bit_rate = match request.bit_rate {
            Some(rate) if rate > 0 => rate as u64,
            Some(rate) => {
                return Err(DomainError::InvalidConfig(format!(
                    "Bitrate must be positive, got {}",
                    rate
                )))
            }
            None => {
                return Err(DomainError::InvalidConfig(
                    "Manual compression requires a bitrate".to_string(),
                ))
            }
        };
        let frame_rate = resolve_frame_rate(request, self.default_frame_rate)?;

        let (width, height) = if video.is_portrait() { (720, 1280) } else { (1280, 720) };

        Ok(OutputTrackConfig {
            video: VideoOutputConfig {
                codec: VideoCodec::H264,
                profile: VideoProfile::High,
                width,
                height,
                bit_rate,
                frame_rate,
                pixel_format: PixelFormat::Yuv420p,
                scaling: ScalingMode::ResizeAspectFill,
                transform: output_transform(video),
            },
            audio: audio_output(request, tracks),
        })
    }
}

/// Quality-preset strategy; never needs a bitrate
#[derive(Debug, Clone)]
pub struct PresetStrategy {
    default_frame_rate: u32,
}

impl PresetStrategy {
    pub fn new(default_frame_rate: u32) -> Self {
        Self { default_frame_rate }
    }

    /// Output dimensions for a preset, aspect kept and rounded to even numbers
    pub fn dimensions(preset: QualityPreset, width: u32, height: u32) -> (u32, u32) {
        let (w, h) = (width as f64, height as f64);
        let scale = match preset {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 0.5_f64.sqrt(),
            QualityPreset::Highest => 1.0,
            boxed => {
                let (box_w, box_h) = match boxed {
                    QualityPreset::Res640x480 => (640.0, 480.0),
                    QualityPreset::Res960x540 => (960.0, 540.0),
                    QualityPreset::Res1280x720 => (1280.0, 720.0),
                    _ => (1920.0, 1080.0),
                };
                let (box_w, box_h) = if width < height { (box_h, box_w) } else { (box_w, box_h) };
                // Never upscale past the source
                (box_w / w).min(box_h / h).min(1.0)
            }
        };
        (round_even(w * scale), round_even(h * scale))
    }

    /// Bitrate derived from the pixel rate
    pub fn bit_rate(width: u32, height: u32, frame_rate: u32) -> u64 {
        (width as f64 * height as f64 * frame_rate as f64 * 0.1).round() as u64
    }
}

impl Default for PresetStrategy {
    fn default() -> Self {
        Self::new(PRESET_FRAME_RATE)
    }
}

impl CompressionStrategy for PresetStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Preset
    }

    fn build(
        &self,
        request: &TranscodeRequest,
        tracks: &SourceTracks,
    ) -> Result<OutputTrackConfig, DomainError> {
        let video = require_video(tracks)?;
        let frame_rate = resolve_frame_rate(request, self.default_frame_rate)?;
        let (width, height) = Self::dimensions(request.quality, video.width, video.height);

        Ok(OutputTrackConfig {
            video: VideoOutputConfig {
                codec: VideoCodec::H264,
                profile: VideoProfile::High,
                width,
                height,
                bit_rate: Self::bit_rate(width, height, frame_rate),
                frame_rate,
                pixel_format: PixelFormat::Yuv420p,
                scaling: ScalingMode::Resize,
                transform: output_transform(video),
            },
            audio: audio_output(request, tracks),
        })
    }
}

/// Default frame rates per strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyDefaults {
    pub manual_frame_rate: u32,
    pub preset_frame_rate: u32,
}

impl Default for StrategyDefaults {
    fn default() -> Self {
        Self {
            manual_frame_rate: DEFAULT_FRAME_RATE,
            preset_frame_rate: PRESET_FRAME_RATE,
        }
    }
}

/// Business rules for strategy selection
pub struct StrategySelector;

impl StrategySelector {
    /// Explicit strategy wins; otherwise a bitrate selects the manual strategy
    pub fn select(
        request: &TranscodeRequest,
        defaults: &StrategyDefaults,
    ) -> Box<dyn CompressionStrategy> {
        match request.resolved_strategy() {
            StrategyKind::Manual => Box::new(ManualStrategy::new(defaults.manual_frame_rate)),
            StrategyKind::Preset => Box::new(PresetStrategy::new(defaults.preset_frame_rate)),
        }
    }
}

/// Integer source/target frame-rate relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCadence {
    /// Keep one of every `ratio` source frames
    pub ratio: u32,
    /// Progress units credited per appended video sample
    pub step: u32,
}

impl FrameCadence {
    pub fn new(source_rate: f64, target_rate: u32) -> Self {
        let source = if source_rate.is_finite() && source_rate > 0.0 {
            source_rate.round() as u32
        } else {
            target_rate
        };
        let ratio = (source / target_rate.max(1)).max(1);
        let step = ((1.0 / ratio as f64).round() as u32).max(1);
        Self { ratio, step }
    }

    /// Pass-through cadence
    pub fn unit() -> Self {
        Self { ratio: 1, step: 1 }
    }
}

/// Progress denominators for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedTotals {
    pub video_frames: u64,
    pub audio_frames: Option<u64>,
}

/// Everything the pipeline needs, computed once before it starts
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub time_range: TimeRange,
    pub output: OutputTrackConfig,
    pub cadence: FrameCadence,
    pub totals: ExpectedTotals,
}

impl TranscodePlan {
    pub fn has_audio(&self) -> bool {
        self.output.audio.is_some()
    }
}

/// Business rules for turning a request into a plan
pub struct TranscodePlanner;

impl TranscodePlanner {
    /// Validate the request, build output settings and resolve the time range
    pub fn plan(
        request: &TranscodeRequest,
        tracks: &SourceTracks,
        destination: PathBuf,
        strategy: &dyn CompressionStrategy,
    ) -> Result<TranscodePlan, DomainError> {
        request.validate()?;
        let video = require_video(tracks)?;
        let output = strategy.build(request, tracks)?;
        let time_range = request.trim.resolve(video.duration)?;

        let target_rate = output.video.frame_rate;
        let cadence = FrameCadence::new(video.nominal_frame_rate, target_rate);

        let video_frames = (time_range.duration * target_rate as f64).floor() as u64;
        let audio_frames = match (&output.audio, &tracks.audio) {
            (Some(audio_out), Some(audio_in)) => {
                let span = (audio_in.duration.min(time_range.end()) - time_range.start).max(0.0);
                Some((span * audio_out.sample_rate as f64).floor() as u64)
            }
            _ => None,
        };

        Ok(TranscodePlan {
            source: request.source.clone(),
            destination,
            time_range,
            output,
            cadence,
            totals: ExpectedTotals {
                video_frames,
                audio_frames,
            },
        })
    }
}

fn require_video(tracks: &SourceTracks) -> Result<&VideoTrackDescriptor, DomainError> {
    tracks
        .video
        .as_ref()
        .ok_or_else(|| DomainError::UnsupportedSource("Source has no video track".to_string()))
}

fn resolve_frame_rate(request: &TranscodeRequest, default: u32) -> Result<u32, DomainError> {
    match request.frame_rate.unwrap_or(default) {
        0 => Err(DomainError::InvalidConfig(
            "Frame rate must be greater than zero".to_string(),
        )),
        rate => Ok(rate),
    }
}

fn output_transform(video: &VideoTrackDescriptor) -> Option<AffineTransform> {
    video
        .rotation()
        .target_transform(video.width as f64, video.height as f64)
}

fn audio_output(request: &TranscodeRequest, tracks: &SourceTracks) -> Option<AudioOutputConfig> {
    if request.include_audio && tracks.audio.is_some() {
        Some(AudioOutputConfig::default())
    } else {
        None
    }
}

fn round_even(value: f64) -> u32 {
    (((value / 2.0).round() as u32) * 2).max(2)
}
