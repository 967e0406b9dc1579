//! HTTP/JSON 시세 서비스 클라이언트.
//!
//! `GET {base_url}/v1/quote/history/candlesticks` 엔드포인트를 사용합니다.
//! 모든 요청은 `app_secret`으로 서명합니다:
//! `X-Signature = hex(HMAC-SHA256(app_secret, "GET|<path>|<query>|<X-Timestamp>"))`.
//!
//! ```text
//! ?symbol=AAPL.US&period=1m&adjust_type=none&start=1760486400&end=1760572799
//!
//! {"code": 0, "message": "", "data": {"candlesticks": [
//!     {"timestamp": 1760536800, "open": "100.5", "close": "101", "high": "102",
//!      "low": "99.5", "volume": 1200, "turnover": "121500"}
//! ]}}
//! ```

use async_trait::async_trait;
use candle_core::{AdjustType, CandlePeriod, RawCandle, SymbolCode};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{QuoteError, QuoteProvider};
use crate::config::QuoteConfig;

const CANDLESTICKS_PATH: &str = "/v1/quote/history/candlesticks";

type HmacSha256 = Hmac<Sha256>;

/// HTTP 시세 클라이언트.
#[derive(Clone)]
pub struct HttpQuoteClient {
    client: reqwest::Client,
    base_url: String,
    app_key: String,
    app_secret: SecretString,
    access_token: SecretString,
    region: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<CandlesticksData>,
}

#[derive(Debug, Deserialize)]
struct CandlesticksData {
    #[serde(default)]
    candlesticks: Vec<RawCandle>,
}

impl HttpQuoteClient {
    /// 설정에서 클라이언트 생성.
    ///
    /// 자격증명이 비어 있으면 `Unauthorized`를 돌려줍니다 (실행 시작 전 치명적 에러).
    pub fn new(config: &QuoteConfig) -> Result<Self, QuoteError> {
        if config.app_key.is_empty()
            || config.app_secret.expose_secret().is_empty()
            || config.access_token.expose_secret().is_empty()
        {
            return Err(QuoteError::Unauthorized(
                "app_key, app_secret, access_token 이 모두 필요합니다".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| QuoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            app_key: config.app_key.clone(),
            app_secret: config.app_secret.clone(),
            access_token: config.access_token.clone(),
            region: config.region.clone(),
        })
    }

    /// 요청 서명 생성
    fn sign(&self, path: &str, query: &str, timestamp: i64) -> Result<String, QuoteError> {
        sign_request(self.app_secret.expose_secret(), path, query, timestamp)
    }

    fn map_transport_error(err: reqwest::Error) -> QuoteError {
        if err.is_timeout() {
            QuoteError::Timeout(err.to_string())
        } else if err.is_decode() {
            QuoteError::Parse(err.to_string())
        } else {
            QuoteError::Network(err.to_string())
        }
    }
}

fn sign_request(
    secret: &str,
    path: &str,
    query: &str,
    timestamp: i64,
) -> Result<String, QuoteError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| QuoteError::Unauthorized(e.to_string()))?;
    mac.update(format!("GET|{}|{}|{}", path, query, timestamp).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl QuoteProvider for HttpQuoteClient {
    async fn fetch_historical_range(
        &self,
        symbol: &SymbolCode,
        period: CandlePeriod,
        adjust: AdjustType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>, QuoteError> {
        let start_ts = start.timestamp().to_string();
        let end_ts = end.timestamp().to_string();
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, CANDLESTICKS_PATH),
            &[
                ("symbol", symbol.as_str()),
                ("period", period.api_code()),
                ("adjust_type", adjust.api_code()),
                ("start", start_ts.as_str()),
                ("end", end_ts.as_str()),
            ],
        )
        .map_err(|e| QuoteError::InvalidRequest(e.to_string()))?;

        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(url.path(), url.query().unwrap_or_default(), timestamp)?;

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.app_key)
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature)
            .header("X-Region", &self.region)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                return Err(QuoteError::Unauthorized(body));
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(QuoteError::RateLimited),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                return Err(QuoteError::InvalidRequest(body));
            }
            s if !s.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(QuoteError::Api {
                    code: i64::from(s.as_u16()),
                    message,
                });
            }
            _ => {}
        }

        let body: ApiResponse = response.json().await.map_err(Self::map_transport_error)?;
        if body.code != 0 {
            return Err(QuoteError::Api {
                code: body.code,
                message: body.message,
            });
        }

        let candles = body.data.map(|d| d.candlesticks).unwrap_or_default();
        debug!(symbol = %symbol, count = candles.len(), "캔들 응답 수신");
        Ok(candles)
    }
}
