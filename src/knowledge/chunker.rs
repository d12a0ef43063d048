//! Text Chunking Module
//!
//! PDF에서 추출한 텍스트를 문단 단위로 분할합니다.
//! 빈 줄(`\n\n`) 경계에서만 자르며, 오버랩이나 크기 제한은 적용하지 않습니다.

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 문단 경계 구분자
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// 문단 청커
///
/// `\n\n` 기준으로 텍스트를 자르고, 공백만 남은 조각은 버립니다.
/// 남은 조각은 그대로 유지합니다 (trim 하지 않음).
///
/// 문단이 하나뿐인 PDF는 거대한 청크 하나가 되며,
/// 임베딩 API 입력 한도를 넘으면 업로드가 실패합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphChunker;

impl ParagraphChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        text.split(PARAGRAPH_SEPARATOR)
            .filter(|fragment| !fragment.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::new())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        let chunker = ParagraphChunker::new();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n \t \n\n").is_empty());
    }

    #[test]
    fn test_chunker_three_paragraphs() {
        let chunker = ParagraphChunker::new();
        assert_eq!(chunker.chunk("A\n\nB\n\nC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_chunker_drops_blank_paragraphs() {
        let chunker = ParagraphChunker::new();
        let chunks = chunker.chunk("\n\nA\n\n\n\nB\n\n");
        assert_eq!(chunks, vec!["A", "B"]);
    }

    #[test]
    fn test_chunker_single_newline_is_not_a_boundary() {
        let chunker = ParagraphChunker::new();
        let chunks = chunker.chunk("line one\nline two\n\nnext");
        assert_eq!(chunks, vec!["line one\nline two", "next"]);
    }

    #[test]
    fn test_chunker_keeps_fragment_verbatim() {
        let chunker = ParagraphChunker::new();
        // 세 줄바꿈은 첫 두 개만 경계로 소비됨
        let chunks = chunker.chunk("A\n\n\nB");
        assert_eq!(chunks, vec!["A", "\nB"]);
    }

    #[test]
    fn test_chunker_single_paragraph() {
        let chunker = default_chunker();
        let text = "하나의 긴 문단. ".repeat(100);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
        assert_eq!(chunker.name(), "ParagraphChunker");
    }
}
