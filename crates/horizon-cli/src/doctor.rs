//! Upload environment diagnostics for `horizon doctor`.

use horizon_core::{AppConfig, CompressionSettings, UploadPolicy};
use horizon_processing::{default_sniffer, ContentSniffer, NoopSniffer};
use horizon_storage::{FileName, LocalStorage, Storage};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const SCRATCH_CONTENT: &[u8] = b"horizon upload write check";
const SNIFF_SAMPLE: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n";

#[derive(Debug, Serialize)]
pub struct Check {
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn pass(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Diagnostics {
    pub healthy: bool,
    pub upload_root: String,
    /// The root was missing and has been created
    pub root_created: bool,
    pub root: Check,
    pub write_check: Check,
    pub sniffer: Check,
    pub policy: UploadPolicy,
    pub compress_images: bool,
    pub compression: CompressionSettings,
}

/// Check that the configured upload root is usable and report the effective policy.
///
/// A missing root is created, as the first upload would do.
pub async fn run_diagnostics(config: &AppConfig) -> Diagnostics {
    let sniffer: Arc<dyn ContentSniffer> = if config.mime_sniffing {
        default_sniffer()
    } else {
        Arc::new(NoopSniffer)
    };

    let mut upload_root = config.upload_root.display().to_string();
    let mut root_created = false;
    let (root, write_check) = match LocalStorage::new(config.upload_root.clone()) {
        Ok(storage) => {
            upload_root = storage.root().display().to_string();
            root_created = !tokio::fs::try_exists(storage.root()).await.unwrap_or(false);
            match storage.ensure_root().await {
                Ok(()) => (Check::pass("upload root exists"), check_write(&storage).await),
                Err(e) => (
                    Check::fail(e.to_string()),
                    Check::fail("skipped: upload root unavailable"),
                ),
            }
        }
        Err(e) => (
            Check::fail(e.to_string()),
            Check::fail("skipped: upload root unavailable"),
        ),
    };
    if !root.ok {
        root_created = false;
    }

    let sniffer = check_sniffer(sniffer.as_ref());

    Diagnostics {
        healthy: root.ok && write_check.ok,
        upload_root,
        root_created,
        root,
        write_check,
        sniffer,
        policy: config.policy.clone(),
        compress_images: config.compress_images,
        compression: config.compression,
    }
}

/// Write, read back and remove a scratch file in the upload root
async fn check_write(storage: &LocalStorage) -> Check {
    let name = match FileName::parse(&format!(".doctor-{}.tmp", Uuid::new_v4().simple())) {
        Ok(name) => name,
        Err(e) => return Check::fail(e.to_string()),
    };

    if let Err(e) = storage.write_new(&name, SCRATCH_CONTENT).await {
        return Check::fail(format!("not writable: {}", e));
    }
    let read_back = storage.read(&name).await;
    let removed = storage.delete(&name).await;

    match (read_back, removed) {
        (Err(e), _) => Check::fail(format!("scratch file unreadable: {}", e)),
        (Ok(data), _) if data != SCRATCH_CONTENT => {
            Check::fail("scratch file read back with different content")
        }
        (Ok(_), Err(e)) => Check::fail(format!("scratch file not removable: {}", e)),
        (Ok(_), Ok(_)) => Check::pass("create, read and delete succeeded"),
    }
}

fn check_sniffer(sniffer: &dyn ContentSniffer) -> Check {
    match sniffer.sniff(SNIFF_SAMPLE) {
        Ok(mime) => Check::pass(format!("{} (sample detected as {})", sniffer.name(), mime)),
        Err(e) => Check::fail(format!("{}: {}; uploads are trusted by extension", sniffer.name(), e)),
    }
}
