//! 메모리 캔들 저장소.
//!
//! PostgreSQL 저장소와 같은 의미(테이블 단위, 타임스탬프 중복 건너뛰기)를 가지며
//! `--dry-run` 실행과 테스트에서 사용합니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use candle_core::{CandlestickRecord, SymbolCode};
use chrono::{DateTime, Utc};

use super::{CandleStore, InsertSummary, StoreError};

type Table = BTreeMap<DateTime<Utc>, CandlestickRecord>;

/// 스레드 안전한 메모리 저장소.
#[derive(Debug, Default)]
pub struct MemoryCandleStore {
    tables: Mutex<HashMap<String, Table>>,
    failing_tables: HashSet<String>,
    failing_batches: HashSet<String>,
    failing_timestamps: HashSet<DateTime<Utc>>,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 심볼의 테이블 생성이 항상 실패하도록 설정.
    pub fn with_failing_table(mut self, symbol: &SymbolCode) -> Self {
        self.failing_tables.insert(symbol.table_name());
        self
    }

    /// 해당 심볼의 배치 저장이 항상 실패하도록 설정 (연결 끊김과 같은 효과).
    pub fn with_failing_batch(mut self, symbol: &SymbolCode) -> Self {
        self.failing_batches.insert(symbol.table_name());
        self
    }

    /// 해당 타임스탬프의 행 저장이 항상 실패하도록 설정.
    pub fn with_failing_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.failing_timestamps.insert(timestamp);
        self
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 테이블 존재 여부.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables().contains_key(table)
    }

    /// 생성된 테이블 이름 (정렬됨).
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables().keys().cloned().collect();
        names.sort();
        names
    }

    /// 테이블의 행을 타임스탬프 순으로 반환.
    pub fn rows(&self, table: &str) -> Vec<CandlestickRecord> {
        self.tables()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 전체 행 수.
    pub fn total_rows(&self) -> usize {
        self.tables().values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl CandleStore for MemoryCandleStore {
    async fn ensure_table(&self, symbol: &SymbolCode) -> Result<(), StoreError> {
        let table = symbol.table_name();
        if self.failing_tables.contains(&table) {
            return Err(StoreError::TableCreation {
                table,
                message: "permission denied for schema public".to_string(),
            });
        }
        self.tables().entry(table).or_default();
        Ok(())
    }

    async fn insert_records(
        &self,
        symbol: &SymbolCode,
        records: &[CandlestickRecord],
    ) -> Result<InsertSummary, StoreError> {
        let mut summary = InsertSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        let name = symbol.table_name();
        if self.failing_batches.contains(&name) {
            return Err(StoreError::Batch {
                table: name,
                message: "connection reset by peer".to_string(),
            });
        }

        let mut tables = self.tables();
        let table = tables.get_mut(&name).ok_or_else(|| StoreError::Batch {
            table: name.clone(),
            message: format!("relation \"{}\" does not exist", name),
        })?;

        for record in records {
            if self.failing_timestamps.contains(&record.timestamp) {
                summary.failed += 1;
                tracing::warn!(
                    symbol = %symbol,
                    timestamp = %record.timestamp,
                    "레코드 저장 실패"
                );
            } else if table.contains_key(&record.timestamp) {
                summary.duplicates += 1;
            } else {
                table.insert(record.timestamp, record.clone());
                summary.inserted += 1;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{to_records, Job, RawCandle};

    fn records(timestamps: &[i64]) -> (SymbolCode, Vec<CandlestickRecord>) {
        let job = Job::new(
            "AAPL.US".parse().unwrap(),
            candle_core::parse_date("2025-10-15").unwrap(),
        );
        let raw: Vec<RawCandle> = timestamps
            .iter()
            .map(|ts| RawCandle {
                timestamp: *ts,
                open: Some(1.into()),
                close: Some(2.into()),
                high: Some(3.into()),
                low: Some(1.into()),
                volume: 10,
                turnover: None,
            })
            .collect();
        let recs = to_records(&job, &raw);
        (job.symbol, recs)
    }

    #[tokio::test]
    async fn test_insert_skips_existing_timestamps() {
        let store = MemoryCandleStore::new();
        let (symbol, recs) = records(&[100, 160, 160]);

        store.ensure_table(&symbol).await.unwrap();
        store.ensure_table(&symbol).await.unwrap();

        let first = store.insert_records(&symbol, &recs).await.unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.duplicates, 1);

        let second = store.insert_records(&symbol, &recs).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(store.rows("aapl_us").len(), 2);
    }

    #[tokio::test]
    async fn test_missing_table_is_batch_error() {
        let store = MemoryCandleStore::new();
        let (symbol, recs) = records(&[100]);
        let err = store.insert_records(&symbol, &recs).await.unwrap_err();
        assert!(matches!(err, StoreError::Batch { .. }));
    }

    #[tokio::test]
    async fn test_failing_table() {
        let symbol: SymbolCode = "0700.HK".parse().unwrap();
        let store = MemoryCandleStore::new().with_failing_table(&symbol);
        assert!(store.ensure_table(&symbol).await.is_err());
        assert!(!store.has_table("0700_hk"));
    }

    #[tokio::test]
    async fn test_failing_row_does_not_stop_batch() {
        let (symbol, recs) = records(&[100, 160, 220]);
        let store = MemoryCandleStore::new().with_failing_timestamp(recs[1].timestamp);
        store.ensure_table(&symbol).await.unwrap();

        let summary = store.insert_records(&symbol, &recs).await.unwrap();
        assert_eq!(
            summary,
            InsertSummary {
                inserted: 2,
                duplicates: 0,
                failed: 1
            }
        );
        assert_eq!(store.rows("aapl_us").len(), 2);
    }

    #[tokio::test]
    async fn test_failing_batch() {
        let (symbol, recs) = records(&[100]);
        let store = MemoryCandleStore::new().with_failing_batch(&symbol);
        store.ensure_table(&symbol).await.unwrap();

        let err = store.insert_records(&symbol, &recs).await.unwrap_err();
        assert!(matches!(err, StoreError::Batch { .. }));
        assert_eq!(store.total_rows(), 0);
    }
}
