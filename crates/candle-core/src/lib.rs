//! # Candle Core
//!
//! 과거 캔들스틱 수집 파이프라인의 도메인 모델 및 타입을 제공합니다.
//!
//! - 심볼 코드와 테이블 이름 규칙
//! - 캔들 주기 / 가격 수정 방식
//! - 수집 작업(Job) 집합 생성
//! - 원시 캔들 → 저장용 레코드 변환
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
