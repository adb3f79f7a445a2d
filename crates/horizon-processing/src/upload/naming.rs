//! Storage names for accepted uploads.
//!
//! Generated names are `"{prefix}_{uuid}.{ext}"` when a prefix is given and
//! `"{uuid}_{sanitized original}"` otherwise. The random v4 UUID is what makes
//! names unique; the sanitized parts only keep them readable.

use horizon_core::models::extension_of;
use uuid::Uuid;

/// Kept short enough that the generated name plus the storage backend's
/// temporary-file decoration stays within a 255-byte filename.
const MAX_SANITIZED_LENGTH: usize = 180;
const MAX_PREFIX_LENGTH: usize = 64;

/// Reduce an untrusted name to a safe single component: the last path segment,
/// ASCII alphanumerics plus `.`, `-` and `_`, whitespace runs folded to `_`,
/// with leading dots and underscores removed. May return an empty string.
pub fn sanitize_component(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }

    let mut sanitized = out.trim_start_matches(['.', '_']).to_string();
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    truncate_keeping_extension(&sanitized)
}

/// Sanitized names are ASCII, so byte and char lengths agree.
fn truncate_keeping_extension(name: &str) -> String {
    if name.len() <= MAX_SANITIZED_LENGTH {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() < 16 => {
            let keep = MAX_SANITIZED_LENGTH - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..MAX_SANITIZED_LENGTH].to_string(),
    }
}

/// Sanitized original filename, falling back to `file.{extension}` when
/// sanitizing left nothing usable or stripped the extension.
pub fn secure_filename(original: &str, extension: &str) -> String {
    let sanitized = sanitize_component(original);
    let keeps_extension = extension_of(&sanitized)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if keeps_extension && !sanitized.starts_with('.') {
        sanitized
    } else {
        format!("file.{}", extension)
    }
}

/// Fresh collision-resistant storage name for an upload
pub fn generate_name(original: &str, extension: &str, prefix: Option<&str>) -> String {
    let id = Uuid::new_v4();
    let prefix = prefix
        .map(|p| sanitize_component(p).chars().take(MAX_PREFIX_LENGTH).collect::<String>())
        .filter(|p| !p.is_empty());

    match prefix {
        Some(prefix) => format!("{}_{}.{}", prefix, id, extension),
        None => format!("{}_{}", id, secure_filename(original, extension)),
    }
}
