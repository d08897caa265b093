//! Historical candle backfill collector.
//!
//! 이 crate는 거래소 과거 캔들을 시간 윈도우 단위로 수집하는 바이너리를 제공합니다:
//! - 활성 종목 × 윈도우 순차 백필
//! - 요청 한도 초과 재시도, 영구 오류 종목 비활성화
//! - 체크포인트 기반 중단/재개

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{BackfillConfig, CollectorConfig};
pub use error::{CollectorError, Result};
pub use modules::{BackfillOptions, BackfillRange, BackfillRunner};
pub use stats::BackfillStats;
