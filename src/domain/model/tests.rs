// Unit tests for domain models

#[cfg(test)]
mod tests {
    use crate::domain::errors::*;
    use crate::domain::model::*;
    use std::path::Path;

    #[test]
    fn test_rotation_from_canonical_transforms() {
        let cases = [
            (AffineTransform::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0), 90),
            (AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, 0.0), 270),
            (AffineTransform::identity(), 0),
            (AffineTransform::new(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0), 180),
        ];
        for (transform, degrees) in cases {
            assert_eq!(Rotation::from_transform(&transform).degrees(), degrees);
        }
    }

    #[test]
    fn test_rotation_ignores_translation() {
        let transform = AffineTransform::new(0.0, 1.0, -1.0, 0.0, 1080.0, 0.0);
        assert_eq!(Rotation::from_transform(&transform), Rotation::Deg90);
    }

    #[test]
    fn test_rotation_non_canonical_is_zero() {
        let skewed = AffineTransform::new(0.7, 0.7, -0.7, 0.7, 0.0, 0.0);
        assert_eq!(Rotation::from_transform(&skewed), Rotation::Deg0);
    }

    #[test]
    fn test_target_transform_90() {
        let t = Rotation::Deg90.target_transform(1920.0, 1080.0).unwrap();
        assert_eq!(t, AffineTransform::new(0.0, 1.0, -1.0, 0.0, 1080.0, 0.0));
    }

    #[test]
    fn test_target_transform_180() {
        let t = Rotation::Deg180.target_transform(1920.0, 1080.0).unwrap();
        assert_eq!(t, AffineTransform::new(-1.0, 0.0, 0.0, -1.0, 1920.0, 1080.0));
    }

    #[test]
    fn test_target_transform_270() {
        let t = Rotation::Deg270.target_transform(1920.0, 1080.0).unwrap();
        assert_eq!(t, AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, 1920.0));
        assert!(Rotation::Deg0.target_transform(1920.0, 1080.0).is_none());
    }

    #[test]
    fn test_display_matrix_conversion() {
        let t = AffineTransform::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let matrix = t.to_display_matrix();
        assert_eq!(matrix[1], 65536);
        assert_eq!(matrix[3], -65536);
        assert_eq!(matrix[8], 1 << 30);
        assert_eq!(AffineTransform::from_display_matrix(&matrix), t);
    }

    #[test]
    fn test_apply_to_size_rotated() {
        let t = AffineTransform::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        assert_eq!(t.apply_to_size(1920.0, 1080.0), (1080.0, 1920.0));
    }

    #[test]
    fn test_trim_window_defaults_to_full_track() {
        let range = TrimWindow::default().resolve(10.0).unwrap();
        assert_eq!(range, TimeRange::new(0.0, 10.0));
    }

    #[test]
    fn test_trim_window_inside_track() {
        let range = TrimWindow::new(Some(2.0), Some(5.0)).resolve(10.0).unwrap();
        assert_eq!(range.start, 2.0);
        assert_eq!(range.duration, 5.0);
        assert_eq!(range.end(), 7.0);
    }

    #[test]
    fn test_trim_window_clamps_to_remaining() {
        let range = TrimWindow::new(Some(8.0), Some(5.0)).resolve(10.0).unwrap();
        assert_eq!(range, TimeRange::new(8.0, 2.0));

        let past_end = TrimWindow::new(Some(12.0), None).resolve(10.0).unwrap();
        assert_eq!(past_end, TimeRange::new(10.0, 0.0));
    }

    #[test]
    fn test_trim_window_rejects_negative() {
        let result = TrimWindow::new(Some(-1.0), None).resolve(10.0);
        assert!(matches!(result, Err(DomainError::InvalidConfig(_))));

        let result = TrimWindow::new(None, Some(f64::NAN)).resolve(10.0);
        assert!(matches!(result, Err(DomainError::InvalidConfig(_))));
    }

    #[test]
    fn test_quality_preset_levels() {
        assert_eq!(QualityPreset::from_level(1), QualityPreset::Low);
        assert_eq!(QualityPreset::from_level(3), QualityPreset::Highest);
        assert_eq!(QualityPreset::from_level(7), QualityPreset::Res1920x1080);
        assert_eq!(QualityPreset::from_level(42), QualityPreset::Medium);
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!(StrategyKind::parse("manual").unwrap(), StrategyKind::Manual);
        assert_eq!(StrategyKind::parse("PRESET").unwrap(), StrategyKind::Preset);
        assert!(StrategyKind::parse("fast").is_err());
    }

    #[test]
    fn test_request_strategy_selection() {
        let request = TranscodeRequest::new("in.mp4");
        assert_eq!(request.resolved_strategy(), StrategyKind::Preset);

        let request = TranscodeRequest::new("in.mp4").with_bit_rate(2_000_000);
        assert_eq!(request.resolved_strategy(), StrategyKind::Manual);

        let request = TranscodeRequest::new("in.mp4")
            .with_bit_rate(2_000_000)
            .with_strategy(StrategyKind::Preset);
        assert_eq!(request.resolved_strategy(), StrategyKind::Preset);
    }

    #[test]
    fn test_request_validation() {
        assert!(TranscodeRequest::new("in.mp4").validate().is_ok());
        assert!(TranscodeRequest::new("").validate().is_err());
        assert!(TranscodeRequest::new("in.mp4")
            .with_destination("in.mp4")
            .validate()
            .is_err());
        assert!(TranscodeRequest::new("in.mp4")
            .with_trim(Some(-3.0), None)
            .validate()
            .is_err());
    }

    #[test]
    fn test_media_info_serializes_camel_case() {
        let info = MediaInfo::empty(Path::new("/tmp/a.mp4")).with_cancel(true);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["path"], "/tmp/a.mp4");
        assert_eq!(json["isCancel"], true);
        assert_eq!(json["width"], 0);
        assert!(json.get("is_cancel").is_none());
    }

    #[test]
    fn test_outcome_accessors() {
        let info = MediaInfo::empty(Path::new("a.mp4"));
        let cancelled = Outcome::Cancelled { info: info.clone() };
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.info(), Some(&info));

        let failed = Outcome::Failed {
            error: DomainError::IoFailure("boom".to_string()),
        };
        assert!(failed.info().is_none());
        assert!(!failed.is_completed());
    }

    #[test]
    fn test_default_audio_output() {
        let audio = AudioOutputConfig::default();
        assert_eq!(audio.sample_rate, 44_100);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.bit_rate, 96_000);
    }
}
