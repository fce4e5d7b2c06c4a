//! # Upload Validator
//!
//! Pure pre-flight checks run before any byte reaches a store: size ceiling
//! for every file, duration ceiling for videos.

use crate::error::{AppError, Result};
use crate::models::{MediaType, MediaUpload};
use crate::probe::{MediaProbe, ProbeError};
use crate::settings::GuestbookSettings;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct UploadValidator {
    max_file_bytes: u64,
    max_video_duration: Duration,
    probe: Arc<dyn MediaProbe>,
}

impl UploadValidator {
    pub fn new(settings: &GuestbookSettings, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            max_file_bytes: settings.max_file_bytes,
            max_video_duration: settings.max_video_duration,
            probe,
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Checks the size ceiling alone. Usable while a body is still streaming in.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(AppError::FileTooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    pub fn validate(&self, upload: &MediaUpload) -> Result<()> {
        self.check_size(upload.size())?;

        if upload.bytes.is_empty() {
            return Err(AppError::ValidationError("The file is empty.".into()));
        }

        match MediaType::from_mime(&upload.mime_type) {
            Some(kind) if kind == upload.kind => {}
            _ => {
                return Err(AppError::ValidationError(format!(
                    "The file type {:?} does not match the declared {} upload.",
                    upload.mime_type, upload.kind
                )))
            }
        }

        if upload.kind == MediaType::Video {
            let duration = self.probe.video_duration(&upload.bytes).map_err(|e| match e {
                ProbeError::Unsupported => {
                    AppError::ValidationError("This video format is not supported.".into())
                }
                other => {
                    tracing::debug!(error = %other, file = %upload.file_name, "video probe failed");
                    AppError::ValidationError("The length of this video could not be read.".into())
                }
            })?;
            if duration > self.max_video_duration {
                return Err(AppError::VideoTooLong {
                    duration,
                    limit: self.max_video_duration,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{fixtures, ContainerProbe, MockMediaProbe};
    use bytes::Bytes;

    fn upload(kind: MediaType, mime: &str, bytes: Vec<u8>) -> MediaUpload {
        MediaUpload {
            bytes: Bytes::from(bytes),
            file_name: "clip".to_string(),
            mime_type: mime.to_string(),
            kind,
        }
    }

    fn validator_with(probe: impl MediaProbe + 'static) -> UploadValidator {
        UploadValidator::new(&GuestbookSettings::default(), Arc::new(probe))
    }

    #[test]
    fn oversized_files_fail_before_probing() {
        let mut probe = MockMediaProbe::new();
        probe.expect_video_duration().never();
        let validator = validator_with(probe);

        let too_big = vec![0u8; (100 * 1024 * 1024) + 1];
        for (kind, mime) in [(MediaType::Image, "image/jpeg"), (MediaType::Video, "video/mp4")] {
            let err = validator.validate(&upload(kind, mime, too_big.clone())).unwrap_err();
            assert!(matches!(err, AppError::FileTooLarge { limit, .. } if limit == 100 * 1024 * 1024));
        }
    }

    #[test]
    fn exactly_at_size_limit_is_accepted() {
        let settings = GuestbookSettings {
            max_file_bytes: 1024,
            ..Default::default()
        };
        let validator = UploadValidator::new(&settings, Arc::new(ContainerProbe));
        let ok = upload(MediaType::Image, "image/png", vec![1u8; 1024]);
        assert!(validator.validate(&ok).is_ok());
        let over = upload(MediaType::Image, "image/png", vec![1u8; 1025]);
        assert!(matches!(validator.validate(&over), Err(AppError::FileTooLarge { .. })));
    }

    #[test]
    fn video_duration_boundary() {
        let validator = validator_with(ContainerProbe);

        let at_limit = upload(MediaType::Video, "video/mp4", fixtures::mp4(1000, 15_000));
        assert!(validator.validate(&at_limit).is_ok());

        let over = upload(MediaType::Video, "video/mp4", fixtures::mp4(1000, 15_010));
        match validator.validate(&over) {
            Err(AppError::VideoTooLong { duration, limit }) => {
                assert_eq!(duration, Duration::from_millis(15_010));
                assert_eq!(limit, Duration::from_secs(15));
            }
            other => panic!("expected VideoTooLong, got {other:?}"),
        }
    }

    #[test]
    fn webm_videos_are_probed_too() {
        let validator = validator_with(ContainerProbe);
        let short = upload(MediaType::Video, "video/webm", fixtures::webm(Some(4_000.0)));
        assert!(validator.validate(&short).is_ok());
        let long = upload(MediaType::Video, "video/webm", fixtures::webm(Some(16_000.0)));
        assert!(matches!(validator.validate(&long), Err(AppError::VideoTooLong { .. })));
    }

    #[test]
    fn video_without_readable_duration_is_rejected() {
        let validator = validator_with(ContainerProbe);
        let live = upload(MediaType::Video, "video/webm", fixtures::webm(None));
        assert!(matches!(validator.validate(&live), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn images_are_never_probed() {
        let mut probe = MockMediaProbe::new();
        probe.expect_video_duration().never();
        let validator = validator_with(probe);
        assert!(validator
            .validate(&upload(MediaType::Image, "image/jpeg", vec![0xFF, 0xD8, 0xFF]))
            .is_ok());
    }

    #[test]
    fn declared_kind_must_match_mime() {
        let validator = validator_with(ContainerProbe);
        let mismatched = upload(MediaType::Image, "video/mp4", vec![1, 2, 3]);
        assert!(matches!(validator.validate(&mismatched), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn empty_files_are_rejected() {
        let validator = validator_with(ContainerProbe);
        let empty = upload(MediaType::Image, "image/jpeg", Vec::new());
        assert!(matches!(validator.validate(&empty), Err(AppError::ValidationError(_))));
    }
}
