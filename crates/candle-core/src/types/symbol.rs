//! 심볼 코드 및 저장 테이블 이름 규칙.
//!
//! 시세 서비스의 심볼은 `BASE.REGION` 형식입니다 (예: `AAPL.US`, `0700.HK`).
//! 심볼마다 하나의 테이블에 저장되며, 테이블 이름은 심볼에서 결정적으로 유도됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 검증된 `BASE.REGION` 심볼.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolCode {
    code: String,
    base: String,
    region: String,
}

impl SymbolCode {
    /// 시세 서비스에 전달하는 원본 심볼 문자열.
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// 기준 티커 (예: `AAPL`).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// 지역 접미사 (예: `US`).
    pub fn region(&self) -> &str {
        &self.region
    }

    /// 저장 테이블 이름.
    ///
    /// 소문자 기준 티커와 지역 접미사를 `_`로 연결합니다.
    /// 티커 내부의 `.`과 `-`도 `_`로 치환됩니다 (`BRK.B.US` → `brk_b_us`).
    pub fn table_name(&self) -> String {
        let base: String = self
            .base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", base, self.region.to_ascii_lowercase())
    }
}

impl FromStr for SymbolCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        let invalid = || CoreError::InvalidSymbol(s.to_string());

        let (base, region) = code.rsplit_once('.').ok_or_else(invalid)?;
        if base.is_empty() || region.is_empty() {
            return Err(invalid());
        }
        if !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        if !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(invalid());
        }

        Ok(Self {
            code: code.to_string(),
            base: base.to_string(),
            region: region.to_string(),
        })
    }
}

impl TryFrom<String> for SymbolCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SymbolCode> for String {
    fn from(symbol: SymbolCode) -> Self {
        symbol.code
    }
}

impl fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_name(symbol: &str) -> String {
        symbol.parse::<SymbolCode>().unwrap().table_name()
    }

    #[test]
    fn test_table_name_derivation() {
        assert_eq!(table_name("AAPL.US"), "aapl_us");
        assert_eq!(table_name("0700.HK"), "0700_hk");
        assert_eq!(table_name("BRK.B.US"), "brk_b_us");
        assert_eq!(table_name(" tsla.us "), "tsla_us");
    }

    #[test]
    fn test_table_name_is_stable() {
        let a: SymbolCode = "AAPL.US".parse().unwrap();
        let b: SymbolCode = "AAPL.US".parse().unwrap();
        assert_eq!(a.table_name(), b.table_name());
    }

    #[test]
    fn test_parse_parts() {
        let symbol: SymbolCode = "0700.HK".parse().unwrap();
        assert_eq!(symbol.base(), "0700");
        assert_eq!(symbol.region(), "HK");
        assert_eq!(symbol.as_str(), "0700.HK");
        assert_eq!(symbol.to_string(), "0700.HK");
    }

    #[test]
    fn test_invalid_symbols() {
        for raw in ["AAPL", ".US", "AAPL.", "AA PL.US", "AAPL.U;S", "aapl\".us", ""] {
            assert!(
                raw.parse::<SymbolCode>().is_err(),
                "{raw:?} should be rejected"
            );
        }
    }
}
