//! 전체 워커가 공유하는 요청 속도 제한.
//!
//! 크기 1의 버킷입니다. 다음 허용 시각 하나를 뮤텍스로 보호하고,
//! 허용될 때마다 그 시각을 `실제 허용 시각 + 주기`로 갱신합니다.
//! 따라서 연속된 두 `admit()` 반환 사이의 간격은 항상 `1/rps` 이상입니다.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::config::DEFAULT_RPS;

/// 공유 속도 제한기.
#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// 초당 `rps`회로 제한. 0이면 기본값(10)을 사용합니다.
    pub fn per_second(rps: u32) -> Self {
        let rps = if rps == 0 { DEFAULT_RPS } else { rps };
        Self::with_period(Duration::from_secs(1) / rps)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            next_slot: Mutex::new(None),
        }
    }

    /// 허용 간격.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 다음 허용 시점까지 대기합니다.
    ///
    /// 대기 중인 워커들은 뮤텍스 획득 순서(FIFO)대로 허용됩니다.
    pub async fn admit(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            sleep_until(at).await;
        }
        *next_slot = Some(Instant::now() + self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_rps() {
        assert_eq!(RateLimiter::per_second(0).period(), Duration::from_millis(100));
        assert_eq!(RateLimiter::per_second(4).period(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admissions_are_spaced_under_contention() {
        let limiter = Arc::new(RateLimiter::per_second(10));
        let admitted = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    limiter.admit().await;
                    admitted.lock().unwrap().push(Instant::now());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = admitted.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 20);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_does_not_allow_burst() {
        let limiter = RateLimiter::per_second(10);
        limiter.admit().await;

        tokio::time::sleep(Duration::from_millis(350)).await;

        let first = Instant::now();
        limiter.admit().await;
        limiter.admit().await;
        assert!(Instant::now() - first >= Duration::from_millis(100));
    }
}
