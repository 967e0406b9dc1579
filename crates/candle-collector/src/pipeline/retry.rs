//! 속도 제한 + 지수 백오프 재시도 조회.

use std::sync::Arc;
use std::time::Duration;

use candle_core::{AdjustType, CandlePeriod, Job, RawCandle, SymbolCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RateLimiter;
use crate::config::RetryConfig;
use crate::quote::{QuoteError, QuoteProvider};

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (1 이상)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// `attempt`번째 시도가 실패한 뒤의 대기 시간.
    ///
    /// `min(base · 2^(attempt-1), max)`
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 조회 단계 실패.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 모든 시도 실패
    #[error("{attempts}회 시도 모두 실패: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: QuoteError,
    },

    /// 재시도해도 결과가 바뀌지 않는 에러
    #[error("재시도 불가 에러 ({attempts}회차): {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: QuoteError,
    },

    /// 실행 취소
    #[error("취소됨")]
    Cancelled,
}

/// 작업 하나의 원격 조회를 재시도와 함께 수행합니다.
#[derive(Clone)]
pub struct FetchRetryExecutor {
    provider: Arc<dyn QuoteProvider>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    period: CandlePeriod,
    adjust: AdjustType,
}

impl FetchRetryExecutor {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        period: CandlePeriod,
        adjust: AdjustType,
    ) -> Self {
        Self {
            provider,
            limiter,
            policy,
            period,
            adjust,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 요청 간 최소 간격.
    pub fn interval(&self) -> Duration {
        self.limiter.period()
    }

    /// 실행 시작 전 자격증명 확인.
    ///
    /// 인증 실패만 치명적입니다. 그 밖의 에러는 경고 후 통과시키고
    /// 작업별 재시도에 맡깁니다.
    pub async fn verify_access(&self, symbol: &SymbolCode) -> Result<(), QuoteError> {
        self.limiter.admit().await;
        match self.provider.verify(symbol).await {
            Ok(()) => {
                debug!(symbol = %symbol, "시세 서비스 인증 확인");
                Ok(())
            }
            Err(e @ QuoteError::Unauthorized(_)) => Err(e),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "인증 확인 요청 실패, 계속 진행");
                Ok(())
            }
        }
    }

    /// 작업 날짜 하루 전체 구간을 조회합니다.
    ///
    /// 매 시도 전에 속도 제한을 통과해야 하며, 재시도 대기는 이 워커만 멈춥니다.
    pub async fn fetch(
        &self,
        job: &Job,
        worker: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let (start, end) = job.day_range();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = self.limiter.admit() => {}
            }

            let err = match self
                .provider
                .fetch_historical_range(&job.symbol, self.period, self.adjust, start, end)
                .await
            {
                Ok(candles) => {
                    debug!(
                        worker,
                        symbol = %job.symbol,
                        date = %job.date,
                        attempt,
                        count = candles.len(),
                        "조회 성공"
                    );
                    return Ok(candles);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(FetchError::NonRetryable {
                    attempts: attempt,
                    source: err,
                });
            }
            if attempt >= max_attempts {
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let backoff = self.policy.next_delay(attempt);
            warn!(
                worker,
                symbol = %job.symbol,
                date = %job.date,
                attempt,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "조회 실패, 재시도 예정"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.next_delay(1), Duration::from_millis(500));
        assert_eq!(policy.next_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.next_delay(3), Duration::from_millis(2000));
        assert_eq!(policy.next_delay(4), Duration::from_millis(2000));
    }

    #[test]
    fn test_delays_monotonic_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 64,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(5_000),
        };
        let mut previous = Duration::ZERO;
        for attempt in 1..=64 {
            let delay = policy.next_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(previous, policy.max_delay);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy: RetryPolicy = RetryConfig {
            max_attempts: 0,
            base_delay_ms: 10,
            max_delay_ms: 20,
        }
        .into();
        assert_eq!(policy.max_attempts, 1);
    }
}
