use horizon_core::models::extension_of;
use horizon_core::{
    FileCategory, UploadError, UploadPolicy, UploadResult, ValidatedUpload, ValidationOutcome,
};
use std::io::{Read, Seek};
use std::sync::Arc;

use crate::candidate::UploadCandidate;
use crate::image::ImageProcessor;
use crate::sniff::{default_sniffer, ContentSniffer};

const UNSAFE_FILENAME_PATTERNS: &[&str] = &["..", "/", "\\", ":", "*", "?", "\"", "<", ">", "|"];

/// Upload validator
///
/// Checks run in a fixed order and stop at the first failure: presence,
/// filename safety, extension, size, sniffed content type, image structure.
/// The candidate's read position is the same after validation as before.
pub struct UploadValidator {
    policy: UploadPolicy,
    sniffer: Arc<dyn ContentSniffer>,
}

impl UploadValidator {
    pub fn new(policy: UploadPolicy, sniffer: Arc<dyn ContentSniffer>) -> Self {
        Self { policy, sniffer }
    }

    pub fn with_default_sniffer(policy: UploadPolicy) -> Self {
        Self::new(policy, default_sniffer())
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn sniffer_name(&self) -> &'static str {
        self.sniffer.name()
    }

    /// Validate and report the outcome with its reason
    pub fn validate<R: Read + Seek>(&self, candidate: &mut UploadCandidate<R>) -> ValidationOutcome {
        ValidationOutcome::from(&self.check(candidate))
    }

    /// Validate, returning what was established about an accepted candidate
    pub fn check<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
    ) -> UploadResult<ValidatedUpload> {
        let result = self.run_checks(candidate);
        match &result {
            Ok(validated) => tracing::debug!(
                file_name = %candidate.filename(),
                category = %validated.category,
                size_bytes = validated.size,
                sniffed_mime = ?validated.sniffed_mime,
                "Upload accepted"
            ),
            Err(e) => tracing::debug!(
                file_name = %candidate.filename(),
                reason = %e,
                "Upload rejected"
            ),
        }
        result
    }

    fn run_checks<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
    ) -> UploadResult<ValidatedUpload> {
        let filename = candidate.filename().trim().to_string();
        if filename.is_empty() {
            return Err(UploadError::InvalidInput("No file selected".to_string()));
        }

        validate_filename_characters(&filename)?;
        let extension = self.validate_extension(&filename)?;
        let category = FileCategory::from_extension(&extension);

        let size = candidate.declared_size();
        self.validate_size(size, category)?;

        let sniffed_mime = self.validate_content(candidate)?;

        if category == FileCategory::Image {
            // One byte past the image ceiling is enough to know the stream lied
            let (limit, _) = self.policy.size_limit_for(category);
            let data = candidate
                .read_from_start(limit.saturating_add(1))
                .map_err(io_failure)?;
            ImageProcessor::inspect(&data, &extension, self.policy.max_image_dimension)?;
        }

        Ok(ValidatedUpload {
            category,
            extension,
            sniffed_mime,
            size,
        })
    }

    /// Lowercased extension if it is on the allow-list
    fn validate_extension(&self, filename: &str) -> UploadResult<String> {
        extension_of(filename)
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| self.policy.is_allowed_extension(ext))
            .ok_or_else(|| {
                UploadError::PolicyViolation(format!(
                    "File type not allowed. Allowed types: {}",
                    self.policy.allowed_extensions.join(", ")
                ))
            })
    }

    pub(crate) fn validate_size(&self, size: u64, category: FileCategory) -> UploadResult<()> {
        if size == 0 {
            return Err(UploadError::InvalidInput("Empty file".to_string()));
        }

        let (limit, label) = self.policy.size_limit_for(category);
        if size > limit {
            return Err(UploadError::PolicyViolation(format!(
                "{} too large. Maximum size: {}MB",
                label,
                limit / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// Sniffed MIME type, or `None` when the sniffer cannot inspect content
    fn validate_content<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
    ) -> UploadResult<Option<String>> {
        let head = candidate
            .peek_head(self.policy.sniff_bytes)
            .map_err(io_failure)?;

        let mime = match self.sniffer.sniff(&head) {
            Ok(mime) => mime,
            Err(e) => {
                tracing::warn!(
                    sniffer = self.sniffer.name(),
                    error = %e,
                    "Content sniffing unavailable, trusting file extension"
                );
                return Ok(None);
            }
        };

        if !self.policy.is_allowed_mime_type(&mime) {
            return Err(UploadError::PolicyViolation(format!(
                "Invalid file type detected: {}",
                mime
            )));
        }
        Ok(Some(mime))
    }
}

fn validate_filename_characters(filename: &str) -> UploadResult<()> {
    if UNSAFE_FILENAME_PATTERNS.iter().any(|p| filename.contains(p)) {
        return Err(UploadError::PolicyViolation(
            "Invalid characters in filename".to_string(),
        ));
    }
    Ok(())
}

fn io_failure(err: std::io::Error) -> UploadError {
    UploadError::InvalidInput(format!("File validation error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::{NoopSniffer, SniffUnavailable};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::{Cursor, Seek, SeekFrom};

    struct FixedSniffer(&'static str);

    impl ContentSniffer for FixedSniffer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn sniff(&self, _head: &[u8]) -> Result<String, SniffUnavailable> {
            Ok(self.0.to_string())
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        RgbImage::from_pixel(width, height, Rgb([9, 9, 9]))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn validator() -> UploadValidator {
        UploadValidator::with_default_sniffer(UploadPolicy::default())
    }

    fn reason(validator: &UploadValidator, name: &str, data: Vec<u8>) -> String {
        let mut candidate = UploadCandidate::from_bytes(name, data);
        validator.validate(&mut candidate).reason
    }

    #[test]
    fn test_missing_filename() {
        assert_eq!(reason(&validator(), "", vec![1]), "No file selected");
        assert_eq!(reason(&validator(), "   ", vec![1]), "No file selected");
    }

    #[test]
    fn test_unsafe_filename_before_extension() {
        let v = validator();
        assert_eq!(
            reason(&v, "../../etc/passwd", vec![1]),
            "Invalid characters in filename"
        );
        assert_eq!(reason(&v, "a|b.png", vec![1]), "Invalid characters in filename");
        assert_eq!(reason(&v, "C:evil.png", vec![1]), "Invalid characters in filename");
    }

    #[test]
    fn test_extension_not_allowed() {
        let v = UploadValidator::new(UploadPolicy::base(), Arc::new(NoopSniffer));
        assert_eq!(
            reason(&v, "script.exe", vec![1]),
            "File type not allowed. Allowed types: png, jpg, jpeg, gif, wav, mp3, ogg"
        );
        assert!(reason(&v, "README", vec![1]).starts_with("File type not allowed"));
        assert!(reason(&v, "notes.pdf", vec![1]).starts_with("File type not allowed"));
    }

    #[test]
    fn test_size_limits_per_category() {
        let v = UploadValidator::new(UploadPolicy::default(), Arc::new(NoopSniffer));

        let mut big_image =
            UploadCandidate::with_declared_size("a.jpg", 20 * 1024 * 1024, Cursor::new(vec![0u8]));
        assert_eq!(
            v.validate(&mut big_image).reason,
            "Image file too large. Maximum size: 5MB"
        );

        let mut big_audio =
            UploadCandidate::with_declared_size("a.mp3", 11 * 1024 * 1024, Cursor::new(vec![0u8]));
        assert_eq!(
            v.validate(&mut big_audio).reason,
            "Audio file too large. Maximum size: 10MB"
        );

        let mut big_doc =
            UploadCandidate::with_declared_size("a.pdf", 17 * 1024 * 1024, Cursor::new(vec![0u8]));
        assert_eq!(
            v.validate(&mut big_doc).reason,
            "File too large. Maximum size: 16MB"
        );
    }

    #[test]
    fn test_empty_file_rejected() {
        let mut candidate = UploadCandidate::from_bytes("a.mp3", Vec::new());
        let err = validator().check(&mut candidate).unwrap_err();
        assert_eq!(err, UploadError::InvalidInput("Empty file".to_string()));
    }

    #[test]
    fn test_sniffed_type_must_be_allowed() {
        let v = UploadValidator::new(UploadPolicy::default(), Arc::new(FixedSniffer("text/html")));
        assert_eq!(
            reason(&v, "clip.mp3", vec![1, 2, 3]),
            "Invalid file type detected: text/html"
        );
    }

    #[cfg(feature = "sniff")]
    #[test]
    fn test_disguised_executable_rejected() {
        let mut elf = b"\x7fELF\x02\x01\x01\0".to_vec();
        elf.resize(64, 0);
        let r = reason(&validator(), "song.mp3", elf);
        assert!(r.starts_with("Invalid file type detected: "), "{}", r);
    }

    #[test]
    fn test_unavailable_sniffer_trusts_extension() {
        let v = UploadValidator::new(UploadPolicy::default(), Arc::new(NoopSniffer));
        let mut candidate = UploadCandidate::from_bytes("notes.pdf", b"%PDF-1.4".to_vec());
        let validated = v.check(&mut candidate).unwrap();
        assert_eq!(validated.category, FileCategory::Document);
        assert_eq!(validated.sniffed_mime, None);
    }

    #[test]
    fn test_valid_image_accepted() {
        let mut candidate = UploadCandidate::from_bytes("Avatar.PNG", png_bytes(40, 30));
        let validated = validator().check(&mut candidate).unwrap();
        assert_eq!(validated.extension, "png");
        assert_eq!(validated.category, FileCategory::Image);
        if cfg!(feature = "sniff") {
            assert_eq!(validated.sniffed_mime.as_deref(), Some("image/png"));
        }
    }

    #[test]
    fn test_image_rules_applied() {
        let v = UploadValidator::new(UploadPolicy::default(), Arc::new(NoopSniffer));
        assert_eq!(
            reason(&v, "photo.jpg", png_bytes(10, 10)),
            "Image format mismatch. Expected: JPEG, Got: PNG"
        );

        let mut policy = UploadPolicy::default();
        policy.max_image_dimension = 50;
        let v = UploadValidator::new(policy, Arc::new(NoopSniffer));
        assert_eq!(
            reason(&v, "wide.png", png_bytes(60, 10)),
            "Image dimensions too large. Maximum: 50x50 pixels"
        );
    }

    #[test]
    fn test_read_position_restored() {
        let v = validator();
        for (name, data) in [
            ("ok.png", png_bytes(8, 8)),
            ("bad.jpg", png_bytes(8, 8)),
            ("bad.exe", vec![1, 2, 3]),
        ] {
            let mut candidate = UploadCandidate::from_bytes(name, data.clone());
            candidate.reader_mut().seek(SeekFrom::Start(2)).unwrap();
            let outcome = v.validate(&mut candidate);
            assert_eq!(outcome.accepted, name == "ok.png", "{}", name);
            assert_eq!(candidate.reader_mut().stream_position().unwrap(), 2, "{}", name);

            // Content is still intact for the write that follows
            let mut stored = Vec::new();
            candidate.reader_mut().seek(SeekFrom::Start(0)).unwrap();
            candidate.reader_mut().read_to_end(&mut stored).unwrap();
            assert_eq!(stored, data, "{}", name);
        }
    }

    #[test]
    fn test_success_reason() {
        let outcome = validator().validate(&mut UploadCandidate::from_bytes("a.png", png_bytes(4, 4)));
        assert!(outcome.accepted);
        assert_eq!(outcome.reason, "File validation successful");
    }
}
