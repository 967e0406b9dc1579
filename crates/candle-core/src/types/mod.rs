//! 기본 값 타입.

pub mod period;
pub mod symbol;

pub use period::*;
pub use symbol::*;
