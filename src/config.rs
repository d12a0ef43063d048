//! 서버 설정
//!
//! CLI 인자와 환경변수(.env 포함)에서 읽은 값을 검증하여 `ServerConfig`로 만듭니다.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::embedding::{DEFAULT_EMBEDDING_MODEL, DEFAULT_RATE_LIMIT_RPM};
use crate::generation::DEFAULT_GENERATION_MODEL;
use crate::knowledge::DEFAULT_TOP_K;

/// 기본 업로드 최대 크기 (32 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.local/share/.pdf-chat/ 등)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pdf-chat")
}

/// 기본 LanceDB 경로
pub fn default_lance_path() -> PathBuf {
    get_data_dir().join("vectors.lance")
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 저장소 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VectorStoreKind {
    /// 디스크 기반 LanceDB
    Lance,
    /// 프로세스 메모리 (재시작 시 사라짐)
    Memory,
}

/// 검증된 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub vector_store: VectorStoreKind,
    pub lance_path: PathBuf,
    pub top_k: usize,
    pub embedding_model: String,
    pub generation_model: String,
    pub embed_rpm: u32,
    /// 외부 API 요청 타임아웃 (None이면 제한 없음)
    pub request_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            upload_dir: PathBuf::from("uploads"),
            vector_store: VectorStoreKind::Lance,
            lance_path: default_lance_path(),
            top_k: DEFAULT_TOP_K,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embed_rpm: DEFAULT_RATE_LIMIT_RPM,
            request_timeout: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// host/port 문자열로 주소 설정
    pub fn with_host_port(mut self, host: &str, port: u16) -> Result<Self> {
        self.addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address: {}:{}", host, port))?;
        Ok(self)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        if self.embed_rpm == 0 {
            anyhow::bail!("embed_rpm must be at least 1");
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("request timeout must be greater than zero");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than zero");
        }
        if self.embedding_model.trim().is_empty() || self.generation_model.trim().is_empty() {
            anyhow::bail!("model names must not be empty");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
