//! 거래소 과거 캔들 조회.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `KlineFetcher` trait: 윈도우 단위 캔들 조회 인터페이스
//! - Binance kline 커넥터 (REST)
//! - 실패 분류와 요청 한도 초과 재시도 컨트롤러

pub mod connector;
pub mod error;
pub mod retry;
pub mod traits;

pub use connector::{BinanceConfig, BinanceKlineClient, MAX_KLINE_LIMIT};
pub use error::*;
pub use retry::{FetchOutcome, RetryController, RetryPolicy};
pub use traits::*;
