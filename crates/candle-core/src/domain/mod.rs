//! 수집 파이프라인 도메인 모델.

pub mod candle;
pub mod job;

pub use candle::*;
pub use job::*;
