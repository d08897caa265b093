//! 데이터 관리 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - PostgreSQL 연결 풀과 마이그레이션
//! - 가격 이력 멱등 upsert 저장소
//! - 종목 레지스트리 (활성 종목 조회, 비활성화)

pub mod error;
pub mod registry;
pub mod storage;

pub use error::{DataError, Result};
pub use registry::{InstrumentRegistry, PgInstrumentRegistry};
pub use storage::database::{Database, DatabaseConfig};
pub use storage::price_history::{CandleSink, PriceHistoryStore, PricePoint};
