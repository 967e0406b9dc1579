//! 에러 타입 정의.

use thiserror::Error;

use crate::quote::QuoteError;
use crate::storage::StoreError;

/// Collector 최상위 에러.
///
/// 실행 전체를 중단시키는 에러만 이 타입으로 전파됩니다.
/// 작업 단위 에러는 워커 안에서 기록되고 카운터에만 반영됩니다.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 파일 읽기/해석 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터베이스 연결 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 시세 서비스 에러 (클라이언트 생성, 인증)
    #[error("Quote service error: {0}")]
    Quote(#[from] QuoteError),

    /// 저장소 에러
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// 도메인 값 검증 에러 (심볼, 날짜)
    #[error(transparent)]
    Core(#[from] candle_core::CoreError),
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
