//! 수집 통계.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::storage::InsertSummary;

/// 워커들이 공유하는 실행 카운터.
///
/// 모든 갱신은 원자적 증가이며 실행이 끝난 뒤 `snapshot()`으로 한 번 읽습니다.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    completed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    cancelled: AtomicU64,
    rows_inserted: AtomicU64,
    rows_duplicate: AtomicU64,
    row_errors: AtomicU64,
    aborted: AtomicBool,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 성공 기록. 증가된 완료 수를 반환합니다.
    pub fn record_success(&self, summary: &InsertSummary) -> u64 {
        self.rows_inserted
            .fetch_add(summary.inserted as u64, Ordering::Relaxed);
        self.rows_duplicate
            .fetch_add(summary.duplicates as u64, Ordering::Relaxed);
        self.row_errors
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 작업 실패 기록. 증가된 완료 수를 반환합니다.
    pub fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 테이블 준비 실패로 실행하지 않은 작업.
    pub fn record_skipped(&self, count: u64) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// 취소로 끝내지 못한 작업.
    pub fn record_cancelled(&self, count: u64) {
        self.cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// 인증 실패 등으로 실행 전체를 중단.
    pub fn record_abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// 현재 값으로 통계 생성.
    pub fn snapshot(&self, total: usize, elapsed: Duration) -> RunStats {
        RunStats {
            total,
            completed: self.completed.load(Ordering::Acquire) as usize,
            succeeded: self.succeeded.load(Ordering::Relaxed) as usize,
            failed: self.failed.load(Ordering::Relaxed) as usize,
            skipped: self.skipped.load(Ordering::Relaxed) as usize,
            cancelled: self.cancelled.load(Ordering::Relaxed) as usize,
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed) as usize,
            rows_duplicate: self.rows_duplicate.load(Ordering::Relaxed) as usize,
            row_errors: self.row_errors.load(Ordering::Relaxed) as usize,
            aborted: self.aborted.load(Ordering::Acquire),
            elapsed,
        }
    }
}

/// 실행 결과 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// 전체 작업 수 (심볼 × 날짜)
    pub total: usize,
    /// 성공 + 실패
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 테이블 준비 실패로 건너뛴 작업
    pub skipped: usize,
    /// 취소로 처리하지 못한 작업
    pub cancelled: usize,
    /// 새로 저장된 캔들 수
    pub rows_inserted: usize,
    /// 이미 존재해서 건너뛴 캔들 수
    pub rows_duplicate: usize,
    /// 개별 저장 실패 캔들 수
    pub row_errors: usize,
    /// 치명적 에러로 중단됨
    pub aborted: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStats {
    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    /// 표준 출력용 한 줄 요약
    pub fn summary_line(&self) -> String {
        format!(
            "succeeded={} failed={} total={}",
            self.succeeded, self.failed, self.total
        )
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            cancelled = self.cancelled,
            rows_inserted = self.rows_inserted,
            rows_duplicate = self.rows_duplicate,
            row_errors = self.row_errors,
            aborted = self.aborted,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_and_summary() {
        let counters = PipelineCounters::new();
        let summary = InsertSummary {
            inserted: 2,
            duplicates: 1,
            failed: 0,
        };
        assert_eq!(counters.record_success(&summary), 1);
        assert_eq!(counters.record_failure(), 2);
        counters.record_skipped(3);

        let stats = counters.snapshot(6, Duration::from_secs(1));
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.rows_inserted, 2);
        assert_eq!(stats.rows_duplicate, 1);
        assert_eq!(stats.summary_line(), "succeeded=1 failed=1 total=6");
        assert!(!stats.aborted);

        counters.record_abort();
        assert!(counters.snapshot(6, Duration::ZERO).aborted);
    }

    #[test]
    fn test_concurrent_completion_indices_are_unique() {
        let counters = Arc::new(PipelineCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .map(|_| counters.record_failure())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4000);
        assert_eq!(counters.snapshot(4000, Duration::ZERO).failed, 4000);
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(RunStats::default().success_rate(), 0.0);
    }
}
