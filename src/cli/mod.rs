//! CLI 모듈
//!
//! pdf-chat CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{default_lance_path, ServerConfig, VectorStoreKind, DEFAULT_MAX_UPLOAD_BYTES};
use crate::embedding::{get_api_key, has_api_key, DEFAULT_EMBEDDING_MODEL, DEFAULT_RATE_LIMIT_RPM};
use crate::generation::DEFAULT_GENERATION_MODEL;
use crate::knowledge::{LanceVectorStore, VectorStore, DEFAULT_TOP_K};
use crate::server::session::{collection_name, validate_user_id, COLLECTION_PREFIX};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "pdf-chat")]
#[command(version, about = "PDF 문서 대화형 RAG 서버", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행
    Serve(ServeArgs),

    /// 저장된 세션 컬렉션 목록
    Collections {
        /// LanceDB 디렉토리
        #[arg(long, env = "PDF_CHAT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// 사용자 컬렉션 삭제
    Drop {
        /// 삭제할 세션의 user_id
        user_id: String,

        /// LanceDB 디렉토리
        #[arg(long, env = "PDF_CHAT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// 상태 확인
    Status,
}

/// serve 명령 인자
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// 바인드 주소
    #[arg(long, env = "PDF_CHAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// 포트
    #[arg(short, long, env = "PDF_CHAT_PORT", default_value_t = 5000)]
    pub port: u16,

    /// 업로드 임시 디렉토리 (시작 시 비워짐)
    #[arg(long, env = "PDF_CHAT_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// LanceDB 디렉토리
    #[arg(long, env = "PDF_CHAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 벡터 저장소 종류
    #[arg(long, value_enum, env = "PDF_CHAT_VECTOR_STORE", default_value = "lance")]
    pub vector_store: VectorStoreKind,

    /// 질문당 검색할 청크 수
    #[arg(short = 'k', long, env = "PDF_CHAT_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Gemini 임베딩 모델
    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Gemini 생성 모델
    #[arg(long, env = "PDF_CHAT_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    pub generation_model: String,

    /// 임베딩 API 분당 최대 요청 수
    #[arg(long, env = "PDF_CHAT_EMBED_RPM", default_value_t = DEFAULT_RATE_LIMIT_RPM)]
    pub embed_rpm: u32,

    /// 외부 API 요청 타임아웃 (초, 지정하지 않으면 제한 없음)
    #[arg(long, env = "PDF_CHAT_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// 업로드 최대 크기 (bytes)
    #[arg(long, env = "PDF_CHAT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl ServeArgs {
    /// 검증된 서버 설정으로 변환
    pub fn into_config(self) -> Result<ServerConfig> {
        let config = ServerConfig {
            upload_dir: self.upload_dir,
            vector_store: self.vector_store,
            lance_path: self.data_dir.unwrap_or_else(default_lance_path),
            top_k: self.top_k,
            embedding_model: self.embedding_model,
            generation_model: self.generation_model,
            embed_rpm: self.embed_rpm,
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            max_upload_bytes: self.max_upload_bytes,
            ..Default::default()
        }
        .with_host_port(&self.host, self.port)?;

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::Collections { data_dir } => cmd_collections(data_dir).await,
        Commands::Drop { user_id, data_dir } => cmd_drop(&user_id, data_dir).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 실행 명령어 (serve)
///
/// API 키가 없으면 포트를 열기 전에 실패합니다.
async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let api_key = get_api_key().context(
        "API 키가 설정되지 않았습니다.\n\n\
         설정 방법:\n  \
         export GEMINI_API_KEY=your-api-key\n  \
         또는\n  \
         export GOOGLE_AI_API_KEY=your-api-key\n\n\
         API 키 발급: https://aistudio.google.com/app/apikey",
    )?;

    let config = args.into_config()?;
    println!("[*] 서버 시작: http://{}", config.addr);

    crate::server::serve(config, api_key).await
}

async fn open_lance(data_dir: Option<PathBuf>) -> Result<LanceVectorStore> {
    let path = data_dir.unwrap_or_else(default_lance_path);
    LanceVectorStore::open(&path)
        .await
        .with_context(|| format!("LanceDB 열기 실패: {:?}", path))
}

/// 컬렉션 목록 명령어 (collections)
async fn cmd_collections(data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_lance(data_dir).await?;
    let names = store.list().await?;

    let sessions: Vec<&String> = names
        .iter()
        .filter(|n| n.starts_with(COLLECTION_PREFIX))
        .collect();

    if sessions.is_empty() {
        println!("[*] 저장된 세션 컬렉션이 없습니다.");
        return Ok(());
    }

    println!("[*] 세션 컬렉션 {} 개", sessions.len());
    for name in sessions {
        println!("  - {}", name);
    }

    Ok(())
}

/// 컬렉션 삭제 명령어 (drop)
async fn cmd_drop(user_id: &str, data_dir: Option<PathBuf>) -> Result<()> {
    let user_id = validate_user_id(Some(user_id)).map_err(|e| anyhow::anyhow!("{}", e))?;
    let name = collection_name(user_id);

    let store = open_lance(data_dir).await?;
    if store.delete(&name).await? {
        println!("[OK] 삭제됨: {}", name);
    } else {
        println!("[!] 컬렉션 없음: {}", name);
    }

    Ok(())
}

/// 상태 확인 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("pdf-chat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let path = default_lance_path();
    match LanceVectorStore::open(&path).await {
        Ok(store) => match store.list().await {
            Ok(names) => {
                println!("[OK] 벡터 저장소: {:?}", path);
                println!("     컬렉션: {} 개", names.len());
            }
            Err(e) => println!("[!] 컬렉션 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 저장소 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
