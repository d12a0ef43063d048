//! 콘텐츠 추출 모듈
//!
//! 업로드된 파일에서 페이지별 텍스트를 추출합니다.
//! 현재는 PDF(pdf-extract)만 지원합니다.

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

// ============================================================================
// Extracted Page
// ============================================================================

/// 추출된 페이지
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// 페이지 번호 (1부터 시작)
    pub page_number: usize,
    /// 추출된 텍스트
    pub text: String,
}

/// 페이지 텍스트를 순서대로 이어 붙임
///
/// 구분자 없이 연결하며, 텍스트가 비어있는 페이지는 건너뜁니다.
pub fn join_pages(pages: &[ExtractedPage]) -> String {
    pages
        .iter()
        .filter(|page| {
            let empty = page.text.trim().is_empty();
            if empty {
                tracing::debug!("Skipping page {} with no text", page.page_number);
            }
            !empty
        })
        .map(|page| page.text.as_str())
        .collect()
}

// ============================================================================
// Document Extractor
// ============================================================================

/// 문서 추출기 트레이트
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// 파일에서 페이지별 텍스트 추출
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>>;

    /// 추출기 이름
    fn name(&self) -> &str;
}

/// PDF 추출기
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page_number, text)| ExtractedPage { page_number, text })
            .collect())
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_number: usize, text: &str) -> ExtractedPage {
        ExtractedPage {
            page_number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_join_pages_concatenates_without_separator() {
        let pages = vec![page(1, "A\n\n"), page(2, "B")];
        assert_eq!(join_pages(&pages), "A\n\nB");
    }

    #[test]
    fn test_join_pages_skips_empty_pages() {
        let pages = vec![page(1, "A"), page(2, "  \n"), page(3, "C")];
        assert_eq!(join_pages(&pages), "AC");
    }

    #[tokio::test]
    async fn test_pdf_extractor_rejects_garbage() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        assert!(PdfExtractor.extract(&path).await.is_err());
    }
}
