//! 가격 이력 저장소 (`cryptos_price_history`).
//!
//! (crypto_id, exchange_id, open_time) 키로 멱등 upsert합니다.
//! 같은 키를 다시 쓰면 키 외의 모든 컬럼을 덮어씁니다.

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::debug;
use trader_core::{Candle, Instrument};

/// 캔들 저장 인터페이스.
#[async_trait]
pub trait CandleSink: Send + Sync {
    /// 캔들 목록을 upsert하고 반영된 행 수를 반환합니다.
    ///
    /// 빈 목록은 저장소에 접근하지 않고 0을 반환합니다.
    async fn upsert(&self, instrument: &Instrument, candles: &[Candle]) -> Result<usize>;
}

/// 저장되는 가격 이력 행.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    pub crypto_id: i64,
    pub exchange_id: i64,
    /// open_time의 UTC 일시
    pub date: NaiveDateTime,
    /// 종가
    pub price: Decimal,
    pub open_time: i64,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
    pub base_asset_volume: Decimal,
    pub number_of_trades: i64,
    pub taker_buy_volume: Decimal,
    pub taker_buy_base_asset_volume: Decimal,
}

impl PricePoint {
    pub fn from_candle(instrument: &Instrument, candle: &Candle) -> Result<Self> {
        let date = candle.utc_date().ok_or_else(|| {
            DataError::InvalidData(format!("open_time out of range: {}", candle.open_time))
        })?;

        Ok(Self {
            crypto_id: instrument.id,
            exchange_id: instrument.exchange_id,
            date,
            price: candle.close,
            open_time: candle.open_time,
            open_price: candle.open,
            high_price: candle.high,
            low_price: candle.low,
            close_price: candle.close,
            volume: candle.volume,
            close_time: candle.close_time,
            base_asset_volume: candle.base_asset_volume,
            number_of_trades: candle.number_of_trades,
            taker_buy_volume: candle.taker_buy_volume,
            taker_buy_base_asset_volume: candle.taker_buy_base_asset_volume,
        })
    }
}

/// open_time 기준 중복 제거 (마지막 값 우선, open_time 오름차순).
///
/// 한 문장에서 같은 키를 두 번 갱신하면 PostgreSQL이 거부하므로 배치 전에 정리합니다.
pub fn dedup_by_open_time(candles: &[Candle]) -> Vec<&Candle> {
    let mut latest: BTreeMap<i64, &Candle> = BTreeMap::new();
    for candle in candles {
        latest.insert(candle.open_time, candle);
    }
    latest.into_values().collect()
}

/// PostgreSQL 가격 이력 저장소.
#[derive(Clone)]
pub struct PriceHistoryStore {
    pool: PgPool,
}

impl PriceHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 종목의 저장된 행 수.
    pub async fn count_for(&self, instrument: &Instrument) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cryptos_price_history
            WHERE crypto_id = $1 AND exchange_id = $2
            "#,
        )
        .bind(instrument.id)
        .bind(instrument.exchange_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl CandleSink for PriceHistoryStore {
    async fn upsert(&self, instrument: &Instrument, candles: &[Candle]) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let points = dedup_by_open_time(candles)
            .into_iter()
            .map(|c| PricePoint::from_candle(instrument, c))
            .collect::<Result<Vec<_>>>()?;

        // UNNEST 패턴으로 일괄 upsert
        let crypto_ids: Vec<i64> = points.iter().map(|p| p.crypto_id).collect();
        let exchange_ids: Vec<i64> = points.iter().map(|p| p.exchange_id).collect();
        let dates: Vec<NaiveDateTime> = points.iter().map(|p| p.date).collect();
        let prices: Vec<Decimal> = points.iter().map(|p| p.price).collect();
        let open_times: Vec<i64> = points.iter().map(|p| p.open_time).collect();
        let opens: Vec<Decimal> = points.iter().map(|p| p.open_price).collect();
        let highs: Vec<Decimal> = points.iter().map(|p| p.high_price).collect();
        let lows: Vec<Decimal> = points.iter().map(|p| p.low_price).collect();
        let closes: Vec<Decimal> = points.iter().map(|p| p.close_price).collect();
        let volumes: Vec<Decimal> = points.iter().map(|p| p.volume).collect();
        let close_times: Vec<i64> = points.iter().map(|p| p.close_time).collect();
        let base_volumes: Vec<Decimal> = points.iter().map(|p| p.base_asset_volume).collect();
        let trades: Vec<i64> = points.iter().map(|p| p.number_of_trades).collect();
        let taker_buy: Vec<Decimal> = points.iter().map(|p| p.taker_buy_volume).collect();
        let taker_buy_base: Vec<Decimal> =
            points.iter().map(|p| p.taker_buy_base_asset_volume).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO cryptos_price_history
                (crypto_id, exchange_id, date, price, open_time, open_price, high_price,
                 low_price, close_price, volume, close_time, base_asset_volume,
                 number_of_trades, taker_buy_volume, taker_buy_base_asset_volume)
            SELECT * FROM UNNEST(
                $1::bigint[], $2::bigint[], $3::timestamp[], $4::numeric[], $5::bigint[],
                $6::numeric[], $7::numeric[], $8::numeric[], $9::numeric[], $10::numeric[],
                $11::bigint[], $12::numeric[], $13::bigint[], $14::numeric[], $15::numeric[]
            )
            ON CONFLICT (crypto_id, exchange_id, open_time) DO UPDATE SET
                date = EXCLUDED.date,
                price = EXCLUDED.price,
                open_price = EXCLUDED.open_price,
                high_price = EXCLUDED.high_price,
                low_price = EXCLUDED.low_price,
                close_price = EXCLUDED.close_price,
                volume = EXCLUDED.volume,
                close_time = EXCLUDED.close_time,
                base_asset_volume = EXCLUDED.base_asset_volume,
                number_of_trades = EXCLUDED.number_of_trades,
                taker_buy_volume = EXCLUDED.taker_buy_volume,
                taker_buy_base_asset_volume = EXCLUDED.taker_buy_base_asset_volume
            "#,
        )
        .bind(&crypto_ids)
        .bind(&exchange_ids)
        .bind(&dates)
        .bind(&prices)
        .bind(&open_times)
        .bind(&opens)
        .bind(&highs)
        .bind(&lows)
        .bind(&closes)
        .bind(&volumes)
        .bind(&close_times)
        .bind(&base_volumes)
        .bind(&trades)
        .bind(&taker_buy)
        .bind(&taker_buy_base)
        .execute(&self.pool)
        .await?;

        let written = result.rows_affected() as usize;

        debug!(
            symbol = %instrument.symbol,
            rows = written,
            "가격 이력 upsert"
        );

        Ok(written)
    }
}
