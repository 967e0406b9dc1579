//! 과거 캔들스틱 일괄 수집기.
//!
//! 심볼 × 날짜 작업 집합을 고정 크기 워커 풀로 처리합니다:
//! - 모든 워커가 공유하는 단일 요청 속도 제한
//! - 일시적 조회 실패에 대한 지수 백오프 재시도
//! - 심볼별 테이블에 중복 없는 저장 (`ON CONFLICT DO NOTHING`)

pub mod config;
pub mod error;
pub mod pipeline;
pub mod quote;
pub mod stats;
pub mod storage;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::{PipelineCounters, RunStats};
