//! # Trader Core
//!
//! 과거 캔들 백필 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! - 수집 대상 종목 (`Instrument`)
//! - 정규화된 OHLCV 캔들 (`Candle`)
//! - 시간 윈도우와 윈도우 계획기 (`TimeWindow`, `WindowPlanner`)
//! - 타임프레임 및 Decimal 유틸리티
//! - 로깅 인프라

pub mod domain;
pub mod logging;
pub mod types;

pub use domain::*;
pub use logging::*;
pub use types::*;
