//! 시세 서비스 클라이언트 추상화.

pub mod http;

use async_trait::async_trait;
use candle_core::{AdjustType, CandlePeriod, RawCandle, SymbolCode};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use http::HttpQuoteClient;

/// 시세 서비스 에러.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 잘못된 요청 (존재하지 않는 심볼 등)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// 응답 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),
}

impl QuoteError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 인증 실패와 잘못된 요청은 같은 요청을 반복해도 결과가 바뀌지 않습니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            QuoteError::Unauthorized(_) | QuoteError::InvalidRequest(_)
        )
    }
}

/// 과거 캔들 조회 인터페이스.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// `[start, end]` 구간의 캔들 조회.
    ///
    /// 데이터가 없는 구간은 빈 목록을 돌려주며 에러가 아닙니다.
    async fn fetch_historical_range(
        &self,
        symbol: &SymbolCode,
        period: CandlePeriod,
        adjust: AdjustType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>, QuoteError>;

    /// 자격증명 확인.
    ///
    /// 기본 구현은 가장 최근 1분봉 구간을 한 번 조회합니다.
    async fn verify(&self, symbol: &SymbolCode) -> Result<(), QuoteError> {
        let period = CandlePeriod::OneMinute;
        let window = chrono::Duration::from_std(period.duration())
            .map_err(|e| QuoteError::InvalidRequest(e.to_string()))?;
        let end = Utc::now();
        self.fetch_historical_range(symbol, period, AdjustType::No, end - window, end)
            .await
            .map(|_| ())
    }
}
