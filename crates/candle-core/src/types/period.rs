//! 캔들 주기와 가격 수정 방식.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CandlePeriod {
    /// 1분봉
    #[default]
    OneMinute,
    /// 5분봉
    FiveMinute,
    /// 15분봉
    FifteenMinute,
    /// 30분봉
    ThirtyMinute,
}

impl CandlePeriod {
    /// 설정 파일의 이름 (`OneMinute` 등).
    pub fn as_str(&self) -> &'static str {
        match self {
            CandlePeriod::OneMinute => "OneMinute",
            CandlePeriod::FiveMinute => "FiveMinute",
            CandlePeriod::FifteenMinute => "FifteenMinute",
            CandlePeriod::ThirtyMinute => "ThirtyMinute",
        }
    }

    /// 시세 API의 주기 코드.
    pub fn api_code(&self) -> &'static str {
        match self {
            CandlePeriod::OneMinute => "1m",
            CandlePeriod::FiveMinute => "5m",
            CandlePeriod::FifteenMinute => "15m",
            CandlePeriod::ThirtyMinute => "30m",
        }
    }

    /// 캔들 하나의 길이.
    pub fn duration(&self) -> Duration {
        match self {
            CandlePeriod::OneMinute => Duration::from_secs(60),
            CandlePeriod::FiveMinute => Duration::from_secs(5 * 60),
            CandlePeriod::FifteenMinute => Duration::from_secs(15 * 60),
            CandlePeriod::ThirtyMinute => Duration::from_secs(30 * 60),
        }
    }

    /// 설정 문자열을 해석합니다. 알 수 없는 값은 1분봉으로 처리합니다.
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(period = value, "알 수 없는 주기, OneMinute 사용");
            Self::default()
        })
    }
}

impl FromStr for CandlePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OneMinute" => Ok(Self::OneMinute),
            "FiveMinute" => Ok(Self::FiveMinute),
            "FifteenMinute" => Ok(Self::FifteenMinute),
            "ThirtyMinute" => Ok(Self::ThirtyMinute),
            _ => Err(format!("Unknown period: {}", s)),
        }
    }
}

impl fmt::Display for CandlePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 가격 수정 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdjustType {
    /// 수정 없음
    #[default]
    No,
    /// 전진 수정 (배당/분할 반영)
    ForwardAdjust,
}

impl AdjustType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustType::No => "No",
            AdjustType::ForwardAdjust => "ForwardAdjust",
        }
    }

    /// 시세 API의 수정 방식 코드.
    pub fn api_code(&self) -> &'static str {
        match self {
            AdjustType::No => "none",
            AdjustType::ForwardAdjust => "forward",
        }
    }

    /// 설정 문자열을 해석합니다. 알 수 없는 값은 수정 없음으로 처리합니다.
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(adjust_type = value, "알 수 없는 수정 방식, No 사용");
            Self::default()
        })
    }
}

impl FromStr for AdjustType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "No" => Ok(Self::No),
            "ForwardAdjust" => Ok(Self::ForwardAdjust),
            _ => Err(format!("Unknown adjust type: {}", s)),
        }
    }
}

impl fmt::Display for AdjustType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_config() {
        assert_eq!(CandlePeriod::from_config("FiveMinute"), CandlePeriod::FiveMinute);
        assert_eq!(CandlePeriod::from_config("ThirtyMinute"), CandlePeriod::ThirtyMinute);
        assert_eq!(CandlePeriod::from_config("Daily"), CandlePeriod::OneMinute);
        assert_eq!(CandlePeriod::from_config(""), CandlePeriod::OneMinute);
    }

    #[test]
    fn test_adjust_from_config() {
        assert_eq!(AdjustType::from_config("ForwardAdjust"), AdjustType::ForwardAdjust);
        assert_eq!(AdjustType::from_config("Backward"), AdjustType::No);
    }

    #[test]
    fn test_period_duration() {
        assert_eq!(CandlePeriod::FifteenMinute.duration().as_secs(), 900);
        assert_eq!(CandlePeriod::OneMinute.api_code(), "1m");
    }
}
