//! 저장소 구현.

pub mod database;
pub mod price_history;
