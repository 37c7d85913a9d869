// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

#[cfg(test)]
mod tests;

/// Output audio sample rate used by every strategy
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
/// Output audio channel count
pub const AUDIO_CHANNELS: u32 = 1;
/// Output audio bitrate in bits per second
pub const AUDIO_BIT_RATE: u64 = 96_000;
/// Target frame rate for the manual pipeline when the request has none
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Target frame rate for preset exports when the request has none
pub const PRESET_FRAME_RATE: u32 = 25;

/// Elementary stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// 2D affine transform in row-vector convention: `[x y 1] * M`
///
/// ```text
/// | a  b  0 |
/// | c  d  0 |
/// | tx ty 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    /// Create a transform from its six components
    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Apply the linear part to a size, returning absolute display dimensions
    pub fn apply_to_size(&self, width: f64, height: f64) -> (f64, f64) {
        let w = width * self.a + height * self.c;
        let h = width * self.b + height * self.d;
        (w.abs(), h.abs())
    }

    /// Build from a container display matrix (16.16 fixed point, 2.30 for the
    /// last column)
    pub fn from_display_matrix(matrix: &[i32; 9]) -> Self {
        let fixed = |v: i32| v as f64 / 65536.0;
        Self::new(
            fixed(matrix[0]),
            fixed(matrix[1]),
            fixed(matrix[3]),
            fixed(matrix[4]),
            fixed(matrix[6]),
            fixed(matrix[7]),
        )
    }

    /// Encode as a container display matrix
    pub fn to_display_matrix(&self) -> [i32; 9] {
        let fixed = |v: f64| (v * 65536.0).round() as i32;
        [
            fixed(self.a),
            fixed(self.b),
            0,
            fixed(self.c),
            fixed(self.d),
            0,
            fixed(self.tx),
            fixed(self.ty),
            1 << 30,
        ]
    }

    fn linear_part(&self) -> (f64, f64, f64, f64) {
        (self.a, self.b, self.c, self.d)
    }
}

/// Canonical playback rotations recognised in a track transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Resolve the rotation by exact match against the four canonical matrices.
    /// Anything else resolves to 0 degrees.
    pub fn from_transform(transform: &AffineTransform) -> Self {
        match transform.linear_part() {
            (a, b, c, d) if a == 0.0 && b == 1.0 && c == -1.0 && d == 0.0 => Rotation::Deg90,
            (a, b, c, d) if a == 0.0 && b == -1.0 && c == 1.0 && d == 0.0 => Rotation::Deg270,
            (a, b, c, d) if a == -1.0 && b == 0.0 && c == 0.0 && d == -1.0 => Rotation::Deg180,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Translate-then-rotate transform that restores playback orientation for
    /// frames re-encoded in sensor orientation. `None` for 0 degrees.
    pub fn target_transform(&self, natural_width: f64, natural_height: f64) -> Option<AffineTransform> {
        match self {
            Rotation::Deg0 => None,
            Rotation::Deg90 => Some(AffineTransform::new(0.0, 1.0, -1.0, 0.0, natural_height, 0.0)),
            Rotation::Deg180 => Some(AffineTransform::new(
                -1.0,
                0.0,
                0.0,
                -1.0,
                natural_width,
                natural_height,
            )),
            Rotation::Deg270 => Some(AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, natural_width)),
        }
    }
}

/// Resolved section of the source to transcode, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Caller-supplied trim window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start: Option<f64>,
    pub duration: Option<f64>,
}

impl TrimWindow {
    pub fn new(start: Option<f64>, duration: Option<f64>) -> Self {
        Self { start, duration }
    }

    /// Validate the raw values
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [("start time", self.start), ("duration", self.duration)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(DomainError::InvalidConfig(format!(
                        "{} must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve against a track duration. The duration is clamped so the window
    /// never runs past the end of the track.
    pub fn resolve(&self, track_duration: f64) -> Result<TimeRange, DomainError> {
        self.validate()?;
        let total = track_duration.max(0.0);
        let start = self.start.unwrap_or(0.0).min(total);
        let remaining = total - start;
        let duration = self.duration.unwrap_or(total).min(remaining);
        Ok(TimeRange::new(start, duration))
    }
}

/// Video track properties read once from the source container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackDescriptor {
    pub width: u32,
    pub height: u32,
    pub nominal_frame_rate: f64,
    /// Track duration in seconds
    pub duration: f64,
    pub transform: AffineTransform,
}

impl VideoTrackDescriptor {
    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::from_transform(&self.transform)
    }
}

/// Audio track properties read once from the source container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackDescriptor {
    pub sample_rate: u32,
    pub channels: u32,
    /// Track duration in seconds
    pub duration: f64,
}

/// First video and audio tracks of a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTracks {
    pub video: Option<VideoTrackDescriptor>,
    pub audio: Option<AudioTrackDescriptor>,
}

/// Named export quality, levels 1..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityPreset {
    Low,
    Medium,
    Highest,
    Res640x480,
    Res960x540,
    Res1280x720,
    Res1920x1080,
}

impl QualityPreset {
    /// Map a numeric quality level. Unknown levels fall back to medium.
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => QualityPreset::Low,
            2 => QualityPreset::Medium,
            3 => QualityPreset::Highest,
            4 => QualityPreset::Res640x480,
            5 => QualityPreset::Res960x540,
            6 => QualityPreset::Res1280x720,
            7 => QualityPreset::Res1920x1080,
            _ => QualityPreset::Medium,
        }
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        QualityPreset::Medium
    }
}

/// Which transcode strategy handles a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Explicit bitrate, fixed 720p output
    Manual,
    /// Settings derived from a quality preset
    Preset,
}

impl StrategyKind {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.to_lowercase().as_str() {
            "manual" => Ok(StrategyKind::Manual),
            "preset" => Ok(StrategyKind::Preset),
            other => Err(DomainError::InvalidConfig(format!(
                "Unknown strategy '{}'. Valid strategies: manual, preset",
                other
            ))),
        }
    }
}

/// A single transcode invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub quality: QualityPreset,
    pub bit_rate: Option<i64>,
    pub frame_rate: Option<u32>,
    pub include_audio: bool,
    pub delete_origin: bool,
    pub trim: TrimWindow,
    pub strategy: Option<StrategyKind>,
}

impl TranscodeRequest {
    /// Create a request with defaults for everything but the source
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            quality: QualityPreset::default(),
            bit_rate: None,
            frame_rate: None,
            include_audio: true,
            delete_origin: false,
            trim: TrimWindow::default(),
            strategy: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: i64) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn with_audio(mut self, include_audio: bool) -> Self {
        self.include_audio = include_audio;
        self
    }

    pub fn with_delete_origin(mut self, delete_origin: bool) -> Self {
        self.delete_origin = delete_origin;
        self
    }

    pub fn with_trim(mut self, start: Option<f64>, duration: Option<f64>) -> Self {
        self.trim = TrimWindow::new(start, duration);
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Strategy to use: explicit choice, otherwise manual when a bitrate is given
    pub fn resolved_strategy(&self) -> StrategyKind {
        match (self.strategy, self.bit_rate) {
            (Some(kind), _) => kind,
            (None, Some(_)) => StrategyKind::Manual,
            (None, None) => StrategyKind::Preset,
        }
    }

    /// Reject requests that can never run
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.source.as_os_str().is_empty() {
            return Err(DomainError::InvalidConfig("Source path cannot be empty".to_string()));
        }
        if let Some(dest) = &self.destination {
            if dest == &self.source {
                return Err(DomainError::InvalidConfig(
                    "Destination must differ from the source".to_string(),
                ));
            }
        }
        self.trim.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoProfile {
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Yuv420p,
}

/// How source frames are fitted into the output dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Scale to cover the output, cropping the overflow
    ResizeAspectFill,
    /// Scale to the output size ignoring aspect ratio
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    F32Planar,
}

/// Encode settings for the output video track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOutputConfig {
    pub codec: VideoCodec,
    pub profile: VideoProfile,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u64,
    pub frame_rate: u32,
    pub pixel_format: PixelFormat,
    pub scaling: ScalingMode,
    pub transform: Option<AffineTransform>,
}

/// Encode settings for the output audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOutputConfig {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_rate: u64,
    pub sample_format: SampleFormat,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Aac,
            sample_rate: AUDIO_SAMPLE_RATE,
            channels: AUDIO_CHANNELS,
            bit_rate: AUDIO_BIT_RATE,
            sample_format: SampleFormat::F32Planar,
        }
    }
}

/// Derived output settings, computed once before the pipeline starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTrackConfig {
    pub video: VideoOutputConfig,
    pub audio: Option<AudioOutputConfig>,
}

/// Result payload describing a media file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub path: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Duration in milliseconds
    pub duration: f64,
    /// File size in bytes
    pub filesize: u64,
    /// Orientation in degrees
    pub orientation: u32,
    pub is_cancel: bool,
}

impl MediaInfo {
    /// Record for a container with no readable video track
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, is_cancel: bool) -> Self {
        self.is_cancel = is_cancel;
        self
    }
}

/// Terminal result of one transcode invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Output written; metadata describes the destination
    Completed { output_path: PathBuf, info: MediaInfo },
    /// Stopped on request; metadata describes the source
    Cancelled { info: MediaInfo },
    /// Reader or writer failure
    Failed { error: DomainError },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled { .. })
    }

    /// Metadata payload, if the outcome carries one
    pub fn info(&self) -> Option<&MediaInfo> {
        match self {
            Outcome::Completed { info, .. } | Outcome::Cancelled { info } => Some(info),
            Outcome::Failed { .. } => None,
        }
    }
}
