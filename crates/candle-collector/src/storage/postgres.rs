//! PostgreSQL 캔들 저장소.

use async_trait::async_trait;
use candle_core::{CandlestickRecord, SymbolCode};
use sqlx::postgres::PgPool;
use tracing::{debug, warn};

use super::{quoted_table, CandleStore, InsertSummary, StoreError};

/// 중복 생성 경합 시 PostgreSQL이 돌려주는 코드 (unique_violation, duplicate_table)
const RACE_CODES: [&str; 2] = ["23505", "42P07"];

/// sqlx 커넥션 풀 기반 저장소.
#[derive(Clone)]
pub struct PgCandleStore {
    pool: PgPool,
}

impl PgCandleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
timestamp   TIMESTAMPTZ PRIMARY KEY,
open        DOUBLE PRECISION,
close       DOUBLE PRECISION,
high        DOUBLE PRECISION,
low         DOUBLE PRECISION,
volume      BIGINT,
turnover    DOUBLE PRECISION
)"#,
        table
    )
}

fn insert_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO {} (timestamp, open, close, high, low, volume, turnover)
 VALUES ($1, $2, $3, $4, $5, $6, $7)
 ON CONFLICT (timestamp) DO NOTHING"#,
        table
    )
}

/// 연결 자체가 사용할 수 없게 된 에러인지 확인 (배치 중단 대상)
fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[async_trait]
impl CandleStore for PgCandleStore {
    async fn ensure_table(&self, symbol: &SymbolCode) -> Result<(), StoreError> {
        let table = quoted_table(symbol)?;

        match sqlx::query(&create_table_sql(&table))
            .execute(&self.pool)
            .await
        {
            Ok(_) => {
                debug!(symbol = %symbol, table = %table, "테이블 확인 완료");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err))
                if db_err
                    .code()
                    .is_some_and(|code| RACE_CODES.contains(&&*code)) =>
            {
                debug!(symbol = %symbol, table = %table, "동시 생성된 테이블 사용");
                Ok(())
            }
            Err(e) => Err(StoreError::TableCreation {
                table,
                message: e.to_string(),
            }),
        }
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

        let table = quoted_table(symbol)?;
        let batch_error = |e: sqlx::Error| StoreError::Batch {
            table: table.clone(),
            message: e.to_string(),
        };

        // 배치 동안 하나의 커넥션을 사용해서 prepared statement를 재사용
        let mut conn = self.pool.acquire().await.map_err(batch_error)?;
        let sql = insert_sql(&table);

        for record in records {
            let result = sqlx::query(&sql)
                .bind(record.timestamp)
                .bind(record.open)
                .bind(record.close)
                .bind(record.high)
                .bind(record.low)
                .bind(record.volume)
                .bind(record.turnover)
                .execute(&mut *conn)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => summary.duplicates += 1,
                Ok(_) => summary.inserted += 1,
                Err(e) if is_connection_error(&e) => return Err(batch_error(e)),
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        symbol = %symbol,
                        timestamp = %record.timestamp,
                        error = %e,
                        "레코드 저장 실패"
                    );
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_skips_conflicts() {
        let sql = insert_sql("\"aapl_us\"");
        assert!(sql.starts_with("INSERT INTO \"aapl_us\""));
        assert!(sql.ends_with("ON CONFLICT (timestamp) DO NOTHING"));
    }

    #[test]
    fn test_create_sql_schema() {
        let sql = create_table_sql("\"0700_hk\"");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"0700_hk\""));
        assert!(sql.contains("timestamp   TIMESTAMPTZ PRIMARY KEY"));
        assert!(sql.contains("volume      BIGINT"));
    }

    #[test]
    fn test_connection_errors_abort_batch() {
        assert!(is_connection_error(&sqlx::Error::PoolTimedOut));
        assert!(!is_connection_error(&sqlx::Error::RowNotFound));
    }
}
