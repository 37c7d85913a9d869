// Probe LibAV adapter - Media file analysis using libav

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::media::Type;
use ffmpeg_next::{codec, ffi, format, Rational};
use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// LibAV-based media probing adapter
#[derive(Debug, Clone, Default)]
pub struct LibavProbeAdapter;

impl LibavProbeAdapter {
    /// Create new LibAV probing adapter
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<Input, DomainError> {
        if !path.exists() {
            return Err(DomainError::UnsupportedSource(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        format::input(&path).map_err(|e| {
            DomainError::UnsupportedSource(format!("Failed to open {}: {}", path.display(), e))
        })
    }

    fn read_tracks(ictx: &Input) -> Result<SourceTracks, DomainError> {
        let container_duration = container_duration(ictx);

        let video = match ictx.streams().best(Type::Video) {
            Some(stream) => Some(Self::describe_video(&stream, container_duration)?),
            None => None,
        };
        let audio = match ictx.streams().best(Type::Audio) {
            Some(stream) => Some(Self::describe_audio(&stream, container_duration)?),
            None => None,
        };
        Ok(SourceTracks { video, audio })
    }

    fn describe_video(
        stream: &Stream,
        container_duration: f64,
    ) -> Result<VideoTrackDescriptor, DomainError> {
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| DomainError::ProbeFailure(format!("Failed to read video track: {}", e)))?;

        let mut frame_rate = rational_to_f64(stream.avg_frame_rate());
        if frame_rate <= 0.0 {
            frame_rate = rational_to_f64(stream.rate());
        }

        Ok(VideoTrackDescriptor {
            width: decoder.width(),
            height: decoder.height(),
            nominal_frame_rate: frame_rate,
            duration: stream_duration(stream, container_duration),
            transform: display_transform(stream),
        })
    }

    fn describe_audio(
        stream: &Stream,
        container_duration: f64,
    ) -> Result<AudioTrackDescriptor, DomainError> {
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().audio())
            .map_err(|e| DomainError::ProbeFailure(format!("Failed to read audio track: {}", e)))?;

        Ok(AudioTrackDescriptor {
            sample_rate: decoder.rate(),
            channels: decoder.channels() as u32,
            duration: stream_duration(stream, container_duration),
        })
    }

    fn build_info(path: &Path, ictx: &Input) -> Result<Option<MediaInfo>, DomainError> {
        let tracks = Self::read_tracks(ictx)?;
        let Some(video) = tracks.video else {
            return Ok(None);
        };

        let metadata = ictx.metadata();
        let title = metadata.get("title").map(str::to_string);
        let author = metadata
            .get("author")
            .or_else(|| metadata.get("artist"))
            .map(str::to_string);

        let (width, height) = video
            .transform
            .apply_to_size(f64::from(video.width), f64::from(video.height));
        let filesize = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        Ok(Some(MediaInfo {
            path: path.to_string_lossy().to_string(),
            title,
            author,
            width: width.round() as u32,
            height: height.round() as u32,
            duration: payload_duration(container_duration(ictx), video.duration) * 1000.0,
            filesize,
            orientation: video.rotation().degrees(),
            is_cancel: false,
        }))
    }
}

#[async_trait]
impl ProbePort for LibavProbeAdapter {
    async fn probe_tracks(&self, path: &Path) -> Result<SourceTracks, DomainError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let ictx = Self::open(&path)?;
            let tracks = Self::read_tracks(&ictx)?;
            debug!("Probed {}: {:?}", path.display(), tracks);
            Ok(tracks)
        })
        .await
        .map_err(|e| DomainError::ProbeFailure(format!("Probe task failed: {}", e)))?
    }

    async fn media_info(&self, path: &Path) -> Result<Option<MediaInfo>, DomainError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let ictx = Self::open(&path)?;
            Self::build_info(&path, &ictx)
        })
        .await
        .map_err(|e| DomainError::ProbeFailure(format!("Probe task failed: {}", e)))?
    }
}

fn rational_to_f64(value: Rational) -> f64 {
    if value.denominator() == 0 {
        0.0
    } else {
        f64::from(value.numerator()) / f64::from(value.denominator())
    }
}

/// Container duration in seconds; zero when the header does not carry one
fn container_duration(ictx: &Input) -> f64 {
    if ictx.duration() > 0 {
        ictx.duration() as f64 / f64::from(ffi::AV_TIME_BASE)
    } else {
        0.0
    }
}

/// Reported duration is the container's; trimming and planning use the stream's
fn payload_duration(container: f64, stream: f64) -> f64 {
    if container > 0.0 {
        container
    } else {
        stream
    }
}

/// Stream duration in seconds, falling back to the container duration
fn stream_duration(stream: &Stream, container_duration: f64) -> f64 {
    let duration = stream.duration();
    if duration > 0 {
        duration as f64 * rational_to_f64(stream.time_base())
    } else {
        container_duration
    }
}

/// Preferred transform from the stream's display matrix; identity if absent
fn display_transform(stream: &Stream) -> AffineTransform {
    // SAFETY: the stream pointer is valid for the lifetime of `stream`, and the
    // side data lookup only reads the codec parameters' array.
    unsafe {
        let par = (*stream.as_ptr()).codecpar;
        if par.is_null() {
            return AffineTransform::identity();
        }
        let side = ffi::av_packet_side_data_get(
            (*par).coded_side_data,
            (*par).nb_coded_side_data,
            ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
        );
        if side.is_null() || (*side).size < std::mem::size_of::<[i32; 9]>() {
            return AffineTransform::identity();
        }
        let mut matrix = [0i32; 9];
        std::ptr::copy_nonoverlapping((*side).data as *const i32, matrix.as_mut_ptr(), 9);
        AffineTransform::from_display_matrix(&matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_to_f64() {
        assert_eq!(rational_to_f64(Rational::new(30000, 1001)), 30000.0 / 1001.0);
        assert_eq!(rational_to_f64(Rational::new(1, 0)), 0.0);
    }

    #[test]
    fn test_payload_duration_prefers_container() {
        assert_eq!(payload_duration(12.5, 12.0), 12.5);
        assert_eq!(payload_duration(0.0, 12.0), 12.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_unsupported() {
        let adapter = LibavProbeAdapter::new();
        let result = adapter.probe_tracks(Path::new("/nonexistent/video.mp4")).await;
        assert!(matches!(result, Err(DomainError::UnsupportedSource(_))));
    }

    #[tokio::test]
    async fn test_non_media_file_is_unsupported() {
        let _ = ffmpeg_next::init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"definitely not a movie").unwrap();

        let adapter = LibavProbeAdapter::new();
        let result = adapter.media_info(&path).await;
        assert!(matches!(result, Err(DomainError::UnsupportedSource(_))));
    }
}
