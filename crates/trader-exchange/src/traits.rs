//! 캔들 조회 trait 정의.

use async_trait::async_trait;
use trader_core::{Candle, Instrument, TimeWindow};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 윈도우 단위 과거 캔들 조회 인터페이스.
///
/// 구현체는 윈도우당 요청 1회만 보내며 네트워크 호출 외의 부수효과가 없어야 합니다.
#[async_trait]
pub trait KlineFetcher: Send + Sync {
    /// 데이터 소스 이름 반환.
    fn name(&self) -> &str;

    /// `window` 구간의 캔들 조회.
    ///
    /// 상장 전/상장 폐지 구간처럼 데이터가 없으면 빈 목록을 반환합니다.
    async fn fetch(
        &self,
        instrument: &Instrument,
        window: &TimeWindow,
    ) -> ExchangeResult<Vec<Candle>>;
}
