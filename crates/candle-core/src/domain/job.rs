//! 수집 작업 (심볼 × 날짜) 정의와 작업 집합 생성.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::CoreError;
use crate::types::SymbolCode;

/// 날짜 설정 형식.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 하나의 (심볼, 날짜) 수집 단위.
///
/// 시작 시 한 번 생성되고 정확히 하나의 워커가 한 번 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub symbol: SymbolCode,
    pub date: NaiveDate,
}

impl Job {
    pub fn new(symbol: SymbolCode, date: NaiveDate) -> Self {
        Self { symbol, date }
    }

    /// 해당 날짜 UTC 기준 `[00:00:00, 23:59:59]` 조회 구간.
    pub fn day_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::seconds(86_399);
        (start, end)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.date.format(DATE_FORMAT))
    }
}

/// 심볼 목록과 날짜 목록의 곱집합으로 작업 목록을 만듭니다.
///
/// 심볼 순서 → 날짜 순서로 나열됩니다. 입력의 중복 항목은 첫 번째만 사용하므로
/// 결과에는 같은 (심볼, 날짜) 쌍이 두 번 나타나지 않습니다.
/// 빈 입력은 빈 작업 목록을 돌려줍니다.
pub fn build_task_set(symbols: &[SymbolCode], dates: &[NaiveDate]) -> Vec<Job> {
    let symbols = dedup_ordered(symbols);
    let dates = dedup_ordered(dates);

    let mut jobs = Vec::with_capacity(symbols.len() * dates.len());
    for symbol in &symbols {
        for date in &dates {
            jobs.push(Job::new((*symbol).clone(), **date));
        }
    }
    jobs
}

fn dedup_ordered<T: Eq + std::hash::Hash>(items: &[T]) -> Vec<&T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().filter(|item| seen.insert(*item)).collect()
}

/// `YYYY-MM-DD` 날짜 문자열 파싱.
pub fn parse_date(value: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| CoreError::InvalidDate(value.to_string()))
}
