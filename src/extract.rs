//! Text extraction for uploaded files.
//!
//! Only two kinds are accepted: PDF (via `pdf-extract`) and UTF-8 plain
//! text. Callers supply bytes plus the declared [`ContentKind`]; this module
//! returns plain UTF-8 text or an error, never panics.

use ragchat_core::models::ContentKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("file is not valid UTF-8 text: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Extract plain text from `bytes` according to `kind`.
pub fn extract_text(bytes: &[u8], kind: ContentKind) -> Result<String, ExtractError> {
    match kind {
        ContentKind::Pdf => extract_pdf(bytes),
        ContentKind::PlainText => extract_plain(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract can panic on malformed documents.
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("malformed PDF".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_plain(bytes: &[u8]) -> Result<String, ExtractError> {
    // A leading BOM is not content.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(std::str::from_utf8(bytes)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid PDF containing the given phrase.
    /// Builds body then xref with correct byte offsets so pdf-extract can parse it.
    pub(crate) fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                stream.len(),
                stream
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn test_pdf_text_extracted() {
        let pdf = minimal_pdf_with_phrase("Lastonia is the capital");
        let text = extract_text(&pdf, ContentKind::Pdf).unwrap();
        assert!(text.contains("Lastonia"), "got {:?}", text);
    }

    #[test]
    fn test_garbage_pdf_is_error() {
        let result = extract_text(b"definitely not a pdf", ContentKind::Pdf);
        assert!(matches!(result, Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn test_plain_text_strips_bom() {
        let text = extract_text(b"\xEF\xBB\xBFhello", ContentKind::PlainText).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let result = extract_text(&[0xff, 0xfe, 0x00], ContentKind::PlainText);
        assert!(matches!(result, Err(ExtractError::Encoding(_))));
    }
}
