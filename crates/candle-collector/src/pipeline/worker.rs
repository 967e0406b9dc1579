//! 고정 크기 워커 풀.
//!
//! 실행 전에 모든 작업을 큐에 넣고 닫은 뒤 `W`개의 워커가 큐를 비웁니다.
//! 각 워커는 작업을 하나씩 `조회(재시도) → 변환 → 저장 → 카운터 갱신` 순서로 처리하며,
//! 큐가 비면 종료합니다. 인증 실패가 나오면 남은 작업을 모두 취소합니다.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use candle_core::{to_records, Job, SymbolCode};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{FetchError, FetchRetryExecutor};
use crate::config::DEFAULT_THREADS;
use crate::quote::QuoteError;
use crate::stats::{PipelineCounters, RunStats};
use crate::storage::CandleStore;

/// 실행 시작 전에 채워지고 닫혀 있는 작업 큐.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub(crate) fn new(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            jobs: Mutex::new(jobs.into_iter().collect()),
        }
    }

    /// 다음 작업. 큐가 비었으면 `None`.
    pub(crate) fn next(&self) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// 남은 작업 수.
    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// 작업 처리 결과 (워커 로그용).
enum JobOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// 워커 풀.
#[derive(Clone)]
pub struct WorkerPool {
    executor: FetchRetryExecutor,
    store: Arc<dyn CandleStore>,
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// `workers`가 0이면 기본값(5)을 사용합니다.
    pub fn new(executor: FetchRetryExecutor, store: Arc<dyn CandleStore>, workers: usize) -> Self {
        Self {
            executor,
            store,
            workers: if workers == 0 { DEFAULT_THREADS } else { workers },
            cancel: CancellationToken::new(),
        }
    }

    /// 외부에서 취소할 수 있는 토큰 지정.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 작업 목록 전체를 처리하고 통계를 반환합니다.
    ///
    /// 심볼별 테이블을 먼저 준비하고, 준비에 실패한 심볼의 작업은 큐에 넣지 않습니다.
    pub async fn run(&self, jobs: Vec<Job>) -> RunStats {
        let started = Instant::now();
        let total = jobs.len();
        let counters = Arc::new(PipelineCounters::new());

        let unavailable = self.prepare_tables(&jobs).await;
        let (runnable, skipped): (Vec<Job>, Vec<Job>) = jobs
            .into_iter()
            .partition(|job| !unavailable.contains(&job.symbol));
        if !skipped.is_empty() {
            warn!(skipped = skipped.len(), "테이블 준비 실패로 작업 제외");
            counters.record_skipped(skipped.len() as u64);
        }

        info!(
            total,
            runnable = runnable.len(),
            workers = self.workers,
            interval_ms = self.executor.interval().as_millis() as u64,
            max_attempts = self.executor.policy().max_attempts,
            "작업 시작"
        );

        // 외부 취소를 전파받고, 치명적 에러 시 이 실행만 멈추는 토큰
        let cancel = self.cancel.child_token();
        let queue = Arc::new(JobQueue::new(runnable));
        let mut set = JoinSet::new();
        for worker_id in 1..=self.workers {
            let mut pool = self.clone();
            pool.cancel = cancel.clone();
            let queue = queue.clone();
            let counters = counters.clone();
            set.spawn(async move { pool.worker_loop(worker_id, &queue, &counters, total).await });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "워커 비정상 종료");
            }
        }

        let leftover = queue.len();
        if leftover > 0 {
            counters.record_cancelled(leftover as u64);
        }

        counters.snapshot(total, started.elapsed())
    }

    /// 작업에 등장하는 심볼의 테이블을 준비하고, 실패한 심볼 집합을 반환합니다.
    async fn prepare_tables(&self, jobs: &[Job]) -> HashSet<SymbolCode> {
        let mut seen = HashSet::new();
        let mut unavailable = HashSet::new();

        for job in jobs {
            if !seen.insert(&job.symbol) {
                continue;
            }
            if let Err(e) = self.store.ensure_table(&job.symbol).await {
                error!(symbol = %job.symbol, error = %e, "테이블 생성 실패, 해당 심볼 건너뜀");
                unavailable.insert(job.symbol.clone());
            }
        }

        unavailable
    }

    async fn worker_loop(
        &self,
        worker: usize,
        queue: &JobQueue,
        counters: &PipelineCounters,
        total: usize,
    ) {
        let mut processed = 0usize;

        while !self.cancel.is_cancelled() {
            let Some(job) = queue.next() else {
                break;
            };
            match self.process(worker, &job, counters, total).await {
                JobOutcome::Succeeded | JobOutcome::Failed => processed += 1,
                JobOutcome::Cancelled => {
                    counters.record_cancelled(1);
                    break;
                }
            }
        }

        info!(worker, processed, "워커 종료");
    }

    async fn process(
        &self,
        worker: usize,
        job: &Job,
        counters: &PipelineCounters,
        total: usize,
    ) -> JobOutcome {
        let started = Instant::now();

        let raw = match self.executor.fetch(job, worker, &self.cancel).await {
            Ok(raw) => raw,
            Err(FetchError::Cancelled) => {
                warn!(worker, symbol = %job.symbol, date = %job.date, "작업 취소");
                return JobOutcome::Cancelled;
            }
            Err(
                e @ FetchError::NonRetryable {
                    source: QuoteError::Unauthorized(_),
                    ..
                },
            ) => {
                counters.record_failure();
                counters.record_abort();
                self.cancel.cancel();
                error!(
                    worker,
                    symbol = %job.symbol,
                    date = %job.date,
                    error = %e,
                    "시세 서비스 인증 실패, 남은 작업 취소"
                );
                return JobOutcome::Failed;
            }
            Err(e) => {
                let completed = counters.record_failure();
                error!(
                    worker,
                    symbol = %job.symbol,
                    date = %job.date,
                    progress = format!("{}/{}", completed, total),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "조회 실패"
                );
                return JobOutcome::Failed;
            }
        };

        let records = to_records(job, &raw);

        match self.store.insert_records(&job.symbol, &records).await {
            Ok(summary) => {
                let completed = counters.record_success(&summary);
                info!(
                    worker,
                    symbol = %job.symbol,
                    date = %job.date,
                    progress = format!("{}/{}", completed, total),
                    records = records.len(),
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    row_errors = summary.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "완료"
                );
                JobOutcome::Succeeded
            }
            Err(e) => {
                let completed = counters.record_failure();
                error!(
                    worker,
                    symbol = %job.symbol,
                    date = %job.date,
                    progress = format!("{}/{}", completed, total),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "저장 실패"
                );
                JobOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drains_in_order() {
        let symbol: SymbolCode = "AAPL.US".parse().unwrap();
        let dates = ["2025-10-15", "2025-10-16"]
            .map(|d| candle_core::parse_date(d).unwrap());
        let queue = JobQueue::new(candle_core::build_task_set(&[symbol], &dates));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next().unwrap().date, dates[0]);
        assert_eq!(queue.next().unwrap().date, dates[1]);
        assert!(queue.next().is_none());
        assert_eq!(queue.len(), 0);
    }
}
