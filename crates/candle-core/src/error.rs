//! 도메인 에러 타입.

use thiserror::Error;

/// 도메인 값 검증 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// `BASE.REGION` 형식이 아닌 심볼
    #[error("잘못된 심볼 형식: {0} (예: AAPL.US)")]
    InvalidSymbol(String),

    /// `YYYY-MM-DD` 형식이 아닌 날짜
    #[error("잘못된 날짜 형식: {0} (예: 2025-10-15)")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
