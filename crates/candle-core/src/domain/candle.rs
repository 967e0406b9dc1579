//! 원시 캔들과 저장용 캔들 레코드.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Job;
use crate::types::SymbolCode;

/// 시세 서비스가 돌려주는 원시 캔들.
///
/// 가격 필드는 데이터가 비어 있는 구간에서 누락될 수 있습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    /// epoch 초
    pub timestamp: i64,
    #[serde(default)]
    pub open: Option<Decimal>,
    #[serde(default)]
    pub close: Option<Decimal>,
    #[serde(default)]
    pub high: Option<Decimal>,
    #[serde(default)]
    pub low: Option<Decimal>,
    pub volume: i64,
    #[serde(default)]
    pub turnover: Option<Decimal>,
}

/// 테이블에 저장되는 캔들 레코드.
///
/// 시가/종가/고가/저가가 모두 있는 원시 캔들에서만 만들어집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlestickRecord {
    pub symbol: SymbolCode,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
    pub turnover: f64,
}

impl CandlestickRecord {
    /// 원시 캔들 변환. OHLC 중 하나라도 없으면 `None`.
    pub fn from_raw(symbol: &SymbolCode, raw: &RawCandle) -> Option<Self> {
        let open = raw.open?.to_f64()?;
        let close = raw.close?.to_f64()?;
        let high = raw.high?.to_f64()?;
        let low = raw.low?.to_f64()?;
        let turnover = raw.turnover.and_then(|t| t.to_f64()).unwrap_or(0.0);
        let timestamp = DateTime::from_timestamp(raw.timestamp, 0)?;

        Some(Self {
            symbol: symbol.clone(),
            timestamp,
            open,
            close,
            high,
            low,
            volume: raw.volume,
            turnover,
        })
    }
}

/// 작업의 원시 캔들 목록을 저장용 레코드로 변환합니다.
///
/// 불완전한 캔들은 에러 없이 제외됩니다. 중복 타임스탬프는 저장 계층에서 처리합니다.
pub fn to_records(job: &Job, raw: &[RawCandle]) -> Vec<CandlestickRecord> {
    let records: Vec<CandlestickRecord> = raw
        .iter()
        .filter_map(|c| CandlestickRecord::from_raw(&job.symbol, c))
        .collect();

    let dropped = raw.len() - records.len();
    if dropped > 0 {
        tracing::debug!(
            symbol = %job.symbol,
            date = %job.date,
            dropped,
            "불완전한 캔들 제외"
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(ts: i64) -> RawCandle {
        RawCandle {
            timestamp: ts,
            open: Some(dec!(100.5)),
            close: Some(dec!(101.25)),
            high: Some(dec!(102)),
            low: Some(dec!(99.75)),
            volume: 1200,
            turnover: Some(dec!(121500.5)),
        }
    }

    fn job() -> Job {
        Job::new(
            "AAPL.US".parse().unwrap(),
            crate::parse_date("2025-10-15").unwrap(),
        )
    }

    #[test]
    fn test_complete_candle_converts() {
        let records = to_records(&job(), &[raw(1_760_536_800)]);
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.timestamp.timestamp(), 1_760_536_800);
        assert_eq!(r.open, 100.5);
        assert_eq!(r.close, 101.25);
        assert_eq!(r.high, 102.0);
        assert_eq!(r.low, 99.75);
        assert_eq!(r.volume, 1200);
        assert_eq!(r.turnover, 121500.5);
        assert_eq!(r.symbol.as_str(), "AAPL.US");
    }

    #[test]
    fn test_missing_price_field_is_dropped() {
        let mut no_open = raw(1);
        no_open.open = None;
        let mut no_close = raw(2);
        no_close.close = None;
        let mut no_high = raw(3);
        no_high.high = None;
        let mut no_low = raw(4);
        no_low.low = None;

        let records = to_records(&job(), &[no_open, no_close, no_high, no_low, raw(5)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp.timestamp(), 5);
    }

    #[test]
    fn test_missing_turnover_defaults_to_zero() {
        let mut candle = raw(10);
        candle.turnover = None;

        let records = to_records(&job(), &[candle]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].turnover, 0.0);
    }

    #[test]
    fn test_duplicates_pass_through() {
        let records = to_records(&job(), &[raw(10), raw(10)]);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_raw_candle_json_with_missing_fields() {
        let json = r#"{"timestamp": 1760536800, "open": "1.5", "close": 2, "volume": 7}"#;
        let candle: RawCandle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.open, Some(dec!(1.5)));
        assert_eq!(candle.close, Some(dec!(2)));
        assert_eq!(candle.high, None);
        assert_eq!(candle.turnover, None);
    }
}
