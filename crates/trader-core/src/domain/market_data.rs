//! 시장 데이터 타입.
//!
//! - `Candle` - 거래소 kline 응답 한 행을 정규화한 OHLCV 캔들

use crate::types::{Price, Quantity};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1개 구간의 OHLCV 캔들.
///
/// 시각은 거래소 응답 그대로 epoch 밀리초로 보관합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간 (epoch ms)
    pub open_time: i64,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
    /// 캔들 종료 시간 (epoch ms)
    pub close_time: i64,
    /// 거래대금 (호가 자산 단위)
    pub base_asset_volume: Quantity,
    /// 체결 건수
    pub number_of_trades: i64,
    /// Taker 매수 거래량
    pub taker_buy_volume: Quantity,
    /// Taker 매수 거래대금
    pub taker_buy_base_asset_volume: Quantity,
}

impl Candle {
    /// 캔들 시작 시간을 UTC 시각으로 반환합니다.
    pub fn open_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    /// 리포트 조인용 `date` 버킷 (UTC 기준, 초 단위).
    ///
    /// 로컬 타임존에 의존하지 않도록 항상 UTC에서 변환합니다.
    pub fn utc_date(&self) -> Option<NaiveDateTime> {
        self.open_time_utc().map(|t| t.naive_utc())
    }

    /// 대표 가격 (종가).
    pub fn price(&self) -> Price {
        self.close
    }
}
