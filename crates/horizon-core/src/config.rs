//! Configuration module
//!
//! Upload allow-lists and ceilings are expressed as an explicit [`UploadPolicy`]
//! handed to the validator at construction, never as module-level state.
//! [`AppConfig`] assembles the policy and storage settings from the environment.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::FileCategory;

const MIB: u64 = 1024 * 1024;

// Policy defaults
const MAX_FILE_SIZE_MB: u64 = 16;
const MAX_IMAGE_SIZE_MB: u64 = 5;
const MAX_AUDIO_SIZE_MB: u64 = 10;
const MAX_IMAGE_DIMENSION: u32 = 4000;
const SNIFF_BYTES: usize = 1024;

// Compression defaults
const COMPRESSION_MAX_DIMENSION: u32 = 1920;
const COMPRESSION_TARGET_KB: u64 = 500;
const COMPRESSION_INITIAL_QUALITY: u8 = 85;
const COMPRESSION_QUALITY_STEP: u8 = 10;
const COMPRESSION_QUALITY_FLOOR: u8 = 60;

const DEFAULT_UPLOAD_ROOT: &str = "static/uploads";

const BASE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "wav", "mp3", "ogg"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

/// Content types a sniffer may report for a given extension.
///
/// Sniffing inspects only the head of the file, so container formats map to
/// what their first bytes look like (a `docx` head is a zip archive).
pub fn mime_types_for_extension(extension: &str) -> &'static [&'static str] {
    match extension.to_ascii_lowercase().as_str() {
        "png" => &["image/png"],
        "jpg" | "jpeg" => &["image/jpeg"],
        "gif" => &["image/gif"],
        "wav" => &["audio/wav", "audio/x-wav", "audio/wave"],
        "mp3" => &["audio/mpeg"],
        "ogg" => &["audio/ogg", "video/ogg", "application/ogg"],
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword", "application/x-ole-storage"],
        "docx" => &[
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/zip",
        ],
        _ => &[],
    }
}

/// Named allow-list configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadProfile {
    /// Images and audio only
    Base,
    /// Base plus pdf, doc and docx
    #[default]
    Extended,
}

impl FromStr for UploadProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "base" => Ok(UploadProfile::Base),
            "extended" => Ok(UploadProfile::Extended),
            _ => Err(anyhow::anyhow!("Invalid upload profile: {}", s)),
        }
    }
}

impl Display for UploadProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadProfile::Base => write!(f, "base"),
            UploadProfile::Extended => write!(f, "extended"),
        }
    }
}

/// Allow-lists and ceilings enforced by the upload validator
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadPolicy {
    pub profile: UploadProfile,
    /// Lowercased extensions without a leading dot, in display order
    pub allowed_extensions: Vec<String>,
    /// Union of the content types of every allowed extension
    pub allowed_mime_types: Vec<String>,
    pub max_file_size: u64,
    pub max_image_size: u64,
    pub max_audio_size: u64,
    pub max_image_dimension: u32,
    /// How many leading bytes are handed to the content sniffer
    pub sniff_bytes: usize,
}

impl UploadPolicy {
    pub fn for_profile(profile: UploadProfile) -> Self {
        let extensions: Vec<&str> = match profile {
            UploadProfile::Base => BASE_EXTENSIONS.to_vec(),
            UploadProfile::Extended => BASE_EXTENSIONS
                .iter()
                .chain(DOCUMENT_EXTENSIONS)
                .copied()
                .collect(),
        };
        Self::with_extensions(profile, &extensions)
    }

    pub fn base() -> Self {
        Self::for_profile(UploadProfile::Base)
    }

    pub fn extended() -> Self {
        Self::for_profile(UploadProfile::Extended)
    }

    fn with_extensions(profile: UploadProfile, extensions: &[&str]) -> Self {
        let mut allowed_mime_types: Vec<String> = Vec::new();
        for ext in extensions {
            for mime in mime_types_for_extension(ext) {
                if !allowed_mime_types.iter().any(|m| m == mime) {
                    allowed_mime_types.push((*mime).to_string());
                }
            }
        }

        Self {
            profile,
            allowed_extensions: extensions.iter().map(|e| e.to_string()).collect(),
            allowed_mime_types,
            max_file_size: MAX_FILE_SIZE_MB * MIB,
            max_image_size: MAX_IMAGE_SIZE_MB * MIB,
            max_audio_size: MAX_AUDIO_SIZE_MB * MIB,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            sniff_bytes: SNIFF_BYTES,
        }
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let normalized = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == normalized)
    }

    pub fn is_allowed_mime_type(&self, mime: &str) -> bool {
        let normalized = mime.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| *m == normalized)
    }

    /// Tightest size ceiling for the category, with the label used in messages
    /// ("Image file", "Audio file" or "File").
    pub fn size_limit_for(&self, category: FileCategory) -> (u64, &'static str) {
        let category_limit = match category {
            FileCategory::Image => Some((self.max_image_size, "Image file")),
            FileCategory::Audio => Some((self.max_audio_size, "Audio file")),
            FileCategory::Document | FileCategory::Unknown => None,
        };

        match category_limit {
            Some((limit, label)) if limit <= self.max_file_size => (limit, label),
            _ => (self.max_file_size, "File"),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one extension must be allowed"));
        }
        if self.max_file_size == 0 || self.max_image_size == 0 || self.max_audio_size == 0 {
            return Err(anyhow::anyhow!("Upload size limits must be greater than zero"));
        }
        if self.max_image_size > self.max_file_size || self.max_audio_size > self.max_file_size {
            return Err(anyhow::anyhow!(
                "MAX_IMAGE_SIZE_MB and MAX_AUDIO_SIZE_MB cannot exceed MAX_FILE_SIZE_MB"
            ));
        }
        if self.max_image_dimension == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_DIMENSION must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::for_profile(UploadProfile::default())
    }
}

/// Image recompression tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CompressionSettings {
    /// Longest allowed side after downscaling
    pub max_dimension: u32,
    pub target_bytes: u64,
    pub initial_quality: u8,
    pub quality_step: u8,
    /// Back-off stops once an attempt was made at or below this quality
    pub quality_floor: u8,
}

impl CompressionSettings {
    /// Qualities tried in order: start, start - step, ... until the first value
    /// at or below the floor (inclusive).
    pub fn quality_schedule(&self) -> Vec<u8> {
        let mut qualities = Vec::new();
        let mut quality = self.initial_quality.clamp(1, 100);
        loop {
            qualities.push(quality);
            if quality <= self.quality_floor || self.quality_step == 0 {
                break;
            }
            match quality.checked_sub(self.quality_step) {
                Some(next) if next >= 1 => quality = next,
                _ => break,
            }
        }
        qualities
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_dimension: COMPRESSION_MAX_DIMENSION,
            target_bytes: COMPRESSION_TARGET_KB * 1024,
            initial_quality: COMPRESSION_INITIAL_QUALITY,
            quality_step: COMPRESSION_QUALITY_STEP,
            quality_floor: COMPRESSION_QUALITY_FLOOR,
        }
    }
}

/// Deployment configuration for the upload pipeline
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upload_root: PathBuf,
    pub policy: UploadPolicy,
    pub compression: CompressionSettings,
    pub compress_images: bool,
    pub mime_sniffing: bool,
}

impl AppConfig {
    /// Read the configuration from the process environment. Binaries load
    /// `.env` with `dotenvy` before calling this.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = match lookup("UPLOAD_PROFILE") {
            Some(s) => s.parse()?,
            None => UploadProfile::default(),
        };

        let mut policy = UploadPolicy::for_profile(profile);
        policy.max_file_size = parse_scaled(&lookup, "MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB, MIB)?;
        policy.max_image_size = parse_scaled(&lookup, "MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB, MIB)?;
        policy.max_audio_size = parse_scaled(&lookup, "MAX_AUDIO_SIZE_MB", MAX_AUDIO_SIZE_MB, MIB)?;
        policy.max_image_dimension =
            parse_or(&lookup, "MAX_IMAGE_DIMENSION", MAX_IMAGE_DIMENSION)?;

        let compression = CompressionSettings {
            max_dimension: parse_or(&lookup, "COMPRESSION_MAX_DIMENSION", COMPRESSION_MAX_DIMENSION)?,
            target_bytes: parse_scaled(&lookup, "COMPRESSION_TARGET_KB", COMPRESSION_TARGET_KB, 1024)?,
            ..CompressionSettings::default()
        };

        let config = AppConfig {
            upload_root: lookup("UPLOAD_ROOT")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT)),
            policy,
            compression,
            compress_images: parse_or(&lookup, "COMPRESS_IMAGES", true)?,
            mime_sniffing: parse_or(&lookup, "MIME_SNIFFING", true)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.policy.validate()?;
        if self.compression.max_dimension == 0 {
            return Err(anyhow::anyhow!(
                "COMPRESSION_MAX_DIMENSION must be greater than zero"
            ));
        }
        if self.compression.target_bytes == 0 {
            return Err(anyhow::anyhow!("COMPRESSION_TARGET_KB must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from(DEFAULT_UPLOAD_ROOT),
            policy: UploadPolicy::default(),
            compression: CompressionSettings::default(),
            compress_images: true,
            mime_sniffing: true,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

/// A size read in `key`'s unit and converted to bytes
fn parse_scaled<F>(lookup: &F, key: &str, default: u64, unit: u64) -> Result<u64, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default)?
        .checked_mul(unit)
        .ok_or_else(|| anyhow::anyhow!("{} is too large", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_base_profile_extensions() {
        let policy = UploadPolicy::base();
        assert_eq!(
            policy.allowed_extensions,
            vec!["png", "jpg", "jpeg", "gif", "wav", "mp3", "ogg"]
        );
        assert!(!policy.is_allowed_extension("pdf"));
        assert!(!policy.is_allowed_mime_type("application/pdf"));
    }

    #[test]
    fn test_extended_profile_adds_documents() {
        let policy = UploadPolicy::extended();
        assert!(policy.is_allowed_extension("PDF"));
        assert!(policy.is_allowed_extension("docx"));
        assert!(policy.is_allowed_mime_type("application/pdf"));
        assert!(policy.is_allowed_mime_type("image/jpeg"));
        // jpg and jpeg share a content type; the union holds it once
        assert_eq!(
            policy
                .allowed_mime_types
                .iter()
                .filter(|m| *m == "image/jpeg")
                .count(),
            1
        );
    }

    #[test]
    fn test_size_limit_tightest_wins() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.size_limit_for(FileCategory::Image), (5 * MIB, "Image file"));
        assert_eq!(policy.size_limit_for(FileCategory::Audio), (10 * MIB, "Audio file"));
        assert_eq!(policy.size_limit_for(FileCategory::Document), (16 * MIB, "File"));
    }

    #[test]
    fn test_size_limit_global_when_category_looser() {
        let mut policy = UploadPolicy::default();
        policy.max_file_size = 4 * MIB;
        assert_eq!(policy.size_limit_for(FileCategory::Image), (4 * MIB, "File"));
    }

    #[test]
    fn test_quality_schedule_default() {
        assert_eq!(CompressionSettings::default().quality_schedule(), vec![85, 75, 65, 55]);
    }

    #[test]
    fn test_quality_schedule_degenerate_step() {
        let settings = CompressionSettings {
            quality_step: 0,
            ..CompressionSettings::default()
        };
        assert_eq!(settings.quality_schedule(), vec![85]);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("BASE".parse::<UploadProfile>().unwrap(), UploadProfile::Base);
        assert_eq!(" extended ".parse::<UploadProfile>().unwrap(), UploadProfile::Extended);
        assert!("full".parse::<UploadProfile>().is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_env() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.upload_root, PathBuf::from("static/uploads"));
        assert_eq!(config.policy.profile, UploadProfile::Extended);
        assert_eq!(config.policy.max_file_size, 16 * MIB);
        assert_eq!(config.compression.target_bytes, 500 * 1024);
        assert!(config.compress_images);
        assert!(config.mime_sniffing);
    }

    #[test]
    fn test_config_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("UPLOAD_ROOT", "/srv/uploads"),
            ("UPLOAD_PROFILE", "base"),
            ("MAX_IMAGE_SIZE_MB", "2"),
            ("COMPRESS_IMAGES", "FALSE"),
            ("MIME_SNIFFING", "false"),
            ("COMPRESSION_TARGET_KB", "200"),
        ]))
        .unwrap();
        assert_eq!(config.upload_root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.policy.profile, UploadProfile::Base);
        assert_eq!(config.policy.max_image_size, 2 * MIB);
        assert_eq!(config.compression.target_bytes, 200 * 1024);
        assert!(!config.compress_images);
        assert!(!config.mime_sniffing);
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_FILE_SIZE_MB", "lots")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_FILE_SIZE_MB", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_IMAGE_SIZE_MB", "32")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("UPLOAD_PROFILE", "all")])).is_err());
    }

    #[test]
    fn test_config_rejects_overflowing_sizes() {
        for key in [
            "MAX_FILE_SIZE_MB",
            "MAX_IMAGE_SIZE_MB",
            "MAX_AUDIO_SIZE_MB",
            "COMPRESSION_TARGET_KB",
        ] {
            let err = AppConfig::from_lookup(lookup_from(&[(key, "18446744073709551615")]))
                .unwrap_err();
            assert_eq!(err.to_string(), format!("{} is too large", key));
        }
    }
}
