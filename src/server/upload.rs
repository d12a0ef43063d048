//! 업로드 디렉토리 관리
//!
//! 서버 시작 시 디렉토리를 비우고 다시 만듭니다.
//! 업로드 파일은 처리 후 바로 삭제합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use unicode_normalization::UnicodeNormalization;

/// 업로드 임시 저장소
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

/// 저장된 업로드 파일
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
}

impl UploadDir {
    /// 디렉토리를 비우고 새로 생성
    pub async fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if tokio::fs::try_exists(&root).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&root)
                .await
                .with_context(|| format!("Failed to clear upload directory: {:?}", root))?;
            tracing::info!("Upload directory {:?} has been cleared", root);
        }

        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create upload directory: {:?}", root))?;
        tracing::info!("Upload directory {:?} is ready", root);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 업로드 파일 저장
    ///
    /// 파일 이름은 정리한 뒤 UUID 접두사를 붙여 동시 업로드끼리 겹치지 않게 합니다.
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<StoredUpload> {
        let stored_name = format!("{}_{}", uuid::Uuid::new_v4(), secure_filename(filename));
        let path = self.root.join(stored_name);

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to save upload: {:?}", path))?;

        tracing::debug!("Saved upload {:?} ({} bytes)", path, data.len());
        Ok(StoredUpload { path })
    }
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일 삭제 (실패는 경고만)
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove upload {:?}: {}", self.path, e);
        }
    }
}

/// 파일 이름 정리
///
/// NFKD로 분해한 뒤 경로 구분자와 공백은 `_`로 바꾸고, ASCII 영숫자와 `.`, `_`, `-` 외의 문자는 버립니다.
/// 앞뒤의 `.`과 `_`는 제거합니다. 결과가 비면 `upload`를 씁니다.
pub fn secure_filename(filename: &str) -> String {
    // 분해된 결합 문자는 아래 필터에서 빠짐 ("é" -> "e")
    let spaced: String = filename
        .nfkd()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let cleaned: String = spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
