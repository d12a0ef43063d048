//! 세션 식별 - 클라이언트가 보낸 `user_id`로 컬렉션 이름 결정
//!
//! 서버는 `user_id`를 인증하지 않습니다. 다른 사용자의 `user_id`를 아는
//! 클라이언트는 그 사용자의 컬렉션에 질문하거나 삭제할 수 있습니다.

use std::sync::OnceLock;

use regex::Regex;

use super::error::ApiError;

/// 컬렉션 이름 접두사
pub const COLLECTION_PREFIX: &str = "rag-experiment-";

/// 허용하는 user_id 패턴 (컬렉션 이름에 그대로 들어감)
const USER_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{1,64}$";

fn user_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USER_ID_PATTERN).expect("Invalid regex"))
}

/// user_id에 대응하는 컬렉션 이름
pub fn collection_name(user_id: &str) -> String {
    format!("{}{}", COLLECTION_PREFIX, user_id)
}

/// user_id 검증
///
/// 없거나 비어있으면 "No user_id provided", 패턴에 맞지 않으면 "Invalid user_id".
pub fn validate_user_id(user_id: Option<&str>) -> Result<&str, ApiError> {
    let user_id = user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Input("No user_id provided".to_string()))?;

    if !user_id_regex().is_match(user_id) {
        return Err(ApiError::Input(
            "Invalid user_id: use letters, digits, '-' or '_' (max 64)".to_string(),
        ));
    }

    Ok(user_id)
}

// ============================================================================
// Tests
// ============================================================================
