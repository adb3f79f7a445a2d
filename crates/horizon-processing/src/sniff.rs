//! Content-type detection from file bytes, independent of the filename.

/// Returned by a sniffer that cannot inspect content at all. Validation then
/// degrades to trusting the extension.
#[derive(Debug, Clone, thiserror::Error)]
#[error("content sniffing unavailable: {0}")]
pub struct SniffUnavailable(pub String);

/// Injectable content-type detection capability
pub trait ContentSniffer: Send + Sync {
    /// Name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// MIME type of the content whose first bytes are `head`
    fn sniff(&self, head: &[u8]) -> Result<String, SniffUnavailable>;
}

/// Sniffer that is never available; uploads are trusted by extension only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSniffer;

impl ContentSniffer for NoopSniffer {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn sniff(&self, _head: &[u8]) -> Result<String, SniffUnavailable> {
        Err(SniffUnavailable("no content sniffer configured".to_string()))
    }
}

/// Magic-byte detection backed by the `infer` crate
#[cfg(feature = "sniff")]
#[derive(Debug, Clone, Copy, Default)]
pub struct InferSniffer;

#[cfg(feature = "sniff")]
impl InferSniffer {
    const EMPTY: &'static str = "application/x-empty";
    const UNKNOWN: &'static str = "application/octet-stream";
}

#[cfg(feature = "sniff")]
impl ContentSniffer for InferSniffer {
    fn name(&self) -> &'static str {
        "infer"
    }

    fn sniff(&self, head: &[u8]) -> Result<String, SniffUnavailable> {
        if head.is_empty() {
            return Ok(Self::EMPTY.to_string());
        }
        let mime = infer::get(head)
            .map(|kind| kind.mime_type())
            .unwrap_or(Self::UNKNOWN);
        Ok(mime.to_string())
    }
}

/// The sniffer used when none is injected: magic bytes when compiled in,
/// otherwise the degraded no-op.
pub fn default_sniffer() -> std::sync::Arc<dyn ContentSniffer> {
    #[cfg(feature = "sniff")]
    {
        std::sync::Arc::new(InferSniffer)
    }
    #[cfg(not(feature = "sniff"))]
    {
        std::sync::Arc::new(NoopSniffer)
    }
}
