use crate::{
    config::Config,
    error::{AssistantError, Result},
    util::sha256_hex,
};
use lopdf::Document as PdfDocument;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

/// Full text of one uploaded PDF. Replaced, never edited, on the next upload.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub content: String,
    pub page_count: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

pub fn load_document(cfg: &Config, path: &Path) -> Result<Document> {
    let bytes = read_upload(cfg, path)?;
    document_from_bytes(cfg, &bytes)
}

pub fn document_from_bytes(cfg: &Config, bytes: &[u8]) -> Result<Document> {
    let fingerprint = sha256_hex(bytes);
    let extracted = extract_text(cfg, bytes)?;
    info!(
        "document loaded pages={} chars={} sha256={}",
        extracted.page_count,
        extracted.text.chars().count(),
        &fingerprint[..12]
    );
    Ok(Document {
        content: extracted.text,
        page_count: extracted.page_count,
        fingerprint,
    })
}

/// Reads the upload fully into memory.
pub fn read_upload(cfg: &Config, path: &Path) -> Result<Vec<u8>> {
    let limit = cfg.extraction.max_input_file_bytes;
    if limit > 0 {
        let meta = std::fs::metadata(path)
            .map_err(|e| AssistantError::extraction(format!("{}: {e}", path.display())))?;
        if meta.len() > limit {
            return Err(AssistantError::extraction(format!(
                "input exceeds max_input_file_bytes: {} > {}",
                meta.len(),
                limit
            )));
        }
    }
    std::fs::read(path).map_err(|e| AssistantError::extraction(format!("{}: {e}", path.display())))
}

/// Concatenates every page's text in page order, with no separators added.
pub fn extract_text(cfg: &Config, bytes: &[u8]) -> Result<ExtractedText> {
    let pages = extract_pages(cfg, bytes)?;
    let page_count = pages.len();
    Ok(ExtractedText {
        text: pages.concat(),
        page_count,
    })
}

pub fn extract_pages(cfg: &Config, bytes: &[u8]) -> Result<Vec<String>> {
    let mut pdf = PdfDocument::load_mem(bytes).map_err(AssistantError::extraction)?;
    // Owner-password-only files open with the empty user password.
    if pdf.is_encrypted() {
        pdf.decrypt("")
            .map_err(|e| AssistantError::extraction(format!("PDF is password protected: {e}")))?;
        debug!("decrypted with empty user password");
    }

    // get_pages is keyed by 1-based page number, so iteration is page order.
    let pages = pdf.get_pages();
    let mut out = Vec::with_capacity(pages.len());
    for &page_no in pages.keys() {
        let text = pdf
            .extract_text(&[page_no])
            .map_err(|e| AssistantError::extraction(format!("page {page_no}: {e}")))?;
        debug!("page {} chars={}", page_no, text.chars().count());
        if cfg.extraction.normalize_unicode {
            out.push(text.nfkc().collect::<String>());
        } else {
            out.push(text);
        }
    }
    Ok(out)
}
