//! PDF text extraction.
//!
//! Extraction failures never propagate: callers get a readable placeholder
//! string, since the text ends up in a generator prompt either way.

use tracing::warn;

/// Returned in place of document text when extraction fails.
pub const EXTRACTION_FAILED: &str = "PDF content extraction failed. Please ensure PDF is valid.";

/// Extract plain text from PDF bytes.
pub fn extract_text(pdf_bytes: &[u8]) -> String {
    // pdf-extract can panic on malformed input as well as return errors.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf_bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, bytes = pdf_bytes.len(), "PDF extraction error");
            EXTRACTION_FAILED.to_string()
        }
        Err(_) => {
            warn!(bytes = pdf_bytes.len(), "PDF extraction panicked");
            EXTRACTION_FAILED.to_string()
        }
    }
}
