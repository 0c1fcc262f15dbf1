//! services/api/src/retention.rs
//!
//! Retention cleanup shared by the `sweeper` binary: expired documents lose
//! their backing file and database record. Safe to run repeatedly.

use chrono::Utc;
use lms_core::ports::DatabaseService;
use std::path::Path;
use tracing::{info, warn};

/// A summary of one cleanup pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub examined: usize,
    pub deleted: usize,
}

/// Removes every document past its expiry, file first, record second: an
/// interrupted pass leaves at worst a record pointing at a missing file,
/// which the next pass clears.
pub async fn purge_expired(
    db: &dyn DatabaseService,
    upload_dir: &Path,
    dry_run: bool,
) -> Result<PurgeReport, lms_core::ports::PortError> {
    let expired = db.find_expired_documents(Utc::now()).await?;
    let mut report = PurgeReport {
        examined: expired.len(),
        ..Default::default()
    };

    for document in expired {
        if dry_run {
            info!(file_id = %document.file_id, expired_at = %document.expires_at,
                "would delete expired document");
            continue;
        }

        let path = upload_dir.join(format!("{}.pdf", document.file_id));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(file_id = %document.file_id, "could not remove {}: {e}", path.display());
                continue;
            }
        }

        db.delete_document(document.id).await?;
        report.deleted += 1;
        info!(file_id = %document.file_id, "purged expired document");
    }

    Ok(report)
}
