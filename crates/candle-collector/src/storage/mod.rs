//! 캔들 저장소.
//!
//! 심볼마다 하나의 테이블을 사용하며 `timestamp`가 기본 키입니다.
//! 같은 타임스탬프는 덮어쓰지 않고 건너뜁니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use candle_core::{CandlestickRecord, SymbolCode};
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryCandleStore;
pub use postgres::PgCandleStore;

/// 저장소 에러.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// SQL 식별자로 사용할 수 없는 테이블 이름
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// 테이블 생성 실패
    #[error("Table creation failed ({table}): {message}")]
    TableCreation { table: String, message: String },

    /// 배치 전체 실패 (연결 끊김 등)
    #[error("Batch insert failed ({table}): {message}")]
    Batch { table: String, message: String },
}

/// 배치 저장 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    /// 새로 저장된 행
    pub inserted: usize,
    /// 이미 존재해서 건너뛴 행
    pub duplicates: usize,
    /// 개별 저장에 실패한 행 (배치는 계속 진행)
    pub failed: usize,
}

/// 심볼별 캔들 테이블 저장소.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// 심볼의 테이블이 없으면 생성합니다. 반복 호출해도 안전합니다.
    async fn ensure_table(&self, symbol: &SymbolCode) -> Result<(), StoreError>;

    /// 레코드를 저장합니다. 이미 있는 타임스탬프는 건너뜁니다.
    async fn insert_records(
        &self,
        symbol: &SymbolCode,
        records: &[CandlestickRecord],
    ) -> Result<InsertSummary, StoreError>;
}

/// 테이블 이름을 큰따옴표로 감싼 식별자로 변환.
///
/// `0700_hk`처럼 숫자로 시작하는 이름도 사용할 수 있습니다.
pub fn quoted_table(symbol: &SymbolCode) -> Result<String, StoreError> {
    let table = symbol.table_name();
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(StoreError::InvalidTableName(table));
    }
    Ok(format!("\"{}\"", table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_table() {
        let aapl: SymbolCode = "AAPL.US".parse().unwrap();
        let tencent: SymbolCode = "0700.HK".parse().unwrap();
        assert_eq!(quoted_table(&aapl).unwrap(), "\"aapl_us\"");
        assert_eq!(quoted_table(&tencent).unwrap(), "\"0700_hk\"");
    }
}
