//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 튜플 벡터로 반환합니다. 페이지 번호는 1부터 시작합니다.
/// 파싱 중 라이브러리가 panic 하면 에러로 변환합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;
    extract_text_from_bytes(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))
}

/// 메모리의 PDF 바이트에서 페이지별 텍스트 추출
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<Vec<(usize, String)>> {
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| anyhow::anyhow!("PDF parser panicked"))?
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

/// PDF 텍스트를 페이지별로 분리 (폼피드 `\x0c` 기준)
///
/// 페이지 내용은 그대로 유지합니다. 문단 경계(`\n\n`)가 청킹에 쓰이므로
/// 여기서 trim 하지 않습니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    text.split('\x0c').map(str::to_string).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[1], "Page 2 content");
    }

    #[test]
    fn test_split_pdf_pages_keeps_paragraph_breaks() {
        let pages = split_pdf_pages("\n\nFirst\n\nSecond\n\n");
        assert_eq!(pages, vec!["\n\nFirst\n\nSecond\n\n"]);
    }

    #[test]
    fn test_extract_invalid_bytes_is_error() {
        assert!(extract_text_from_bytes(b"definitely not a pdf").is_err());
    }

    #[test]
    fn test_extract_missing_file_is_error() {
        let err = extract_text_from_pdf(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(err.to_string().contains("Failed to read PDF"));
    }
}
