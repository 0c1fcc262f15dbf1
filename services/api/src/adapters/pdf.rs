//! services/api/src/adapters/pdf.rs
//!
//! PDF text extraction adapter backed by `lopdf`. Parsing is CPU-bound, so the
//! work runs on the blocking thread pool rather than on the async runtime.

use async_trait::async_trait;
use lms_core::analysis::ExtractedPage;
use lms_core::ports::{PortError, PortResult, TextExtractionService};
use lopdf::Document;

/// A text extraction adapter that implements the `TextExtractionService` port.
#[derive(Clone, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn extract_sync(bytes: &[u8]) -> PortResult<(Vec<ExtractedPage>, u32)> {
    let document = Document::load_mem(bytes)
        .map_err(|e| PortError::Unexpected(format!("failed to parse PDF: {e}")))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let page_count = page_numbers.len() as u32;

    let mut pages = Vec::new();
    for number in page_numbers {
        // Pages with unreadable content streams are skipped, not fatal; a
        // scanned PDF simply yields no text.
        let text = match document.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("skipping unreadable page {}: {}", number, e);
                continue;
            }
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        pages.push(ExtractedPage { page: number, text });
    }

    Ok((pages, page_count))
}

#[async_trait]
impl TextExtractionService for LopdfExtractor {
    async fn extract_pages(&self, bytes: &[u8]) -> PortResult<(Vec<ExtractedPage>, u32)> {
        let owned = bytes.to_vec();
        tokio::task::spawn_blocking(move || extract_sync(&owned))
            .await
            .map_err(|e| PortError::Unexpected(format!("extraction task panicked: {e}")))?
    }
}
