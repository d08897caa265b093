//! 종목 레지스트리.
//!
//! 활성 종목 조회와 영구 오류 종목의 비활성화(soft delete)를 담당합니다.
//! 모든 쿼리는 바인딩 파라미터만 사용합니다.

use crate::error::Result;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::info;
use trader_core::Instrument;

/// 종목 레지스트리 인터페이스.
#[async_trait]
pub trait InstrumentRegistry: Send + Sync {
    /// 거래소 이름에 `exchange_filter`가 포함된 활성 종목 목록.
    async fn list_active_instruments(&self, exchange_filter: &str) -> Result<Vec<Instrument>>;

    /// 비활성 종목까지 포함한 전체 목록 (재수집용).
    async fn list_all_instruments(&self, exchange_filter: &str) -> Result<Vec<Instrument>>;

    /// 종목 비활성화 (`is_enabled = 0`).
    async fn disable(&self, instrument_id: i64) -> Result<()>;
}

#[derive(Debug, FromRow)]
struct InstrumentRow {
    id: i64,
    symbol: String,
    exchange_id: i64,
}

impl From<InstrumentRow> for Instrument {
    fn from(row: InstrumentRow) -> Self {
        Instrument::new(row.id, row.symbol, row.exchange_id)
    }
}

/// `LIKE` 패턴 생성 (소문자, 부분 일치).
pub fn exchange_pattern(filter: &str) -> String {
    format!("%{}%", filter.trim().to_lowercase())
}

/// PostgreSQL 종목 레지스트리.
#[derive(Clone)]
pub struct PgInstrumentRegistry {
    pool: PgPool,
}

impl PgInstrumentRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn query_instruments(
        &self,
        exchange_filter: &str,
        include_disabled: bool,
    ) -> Result<Vec<Instrument>> {
        let rows: Vec<InstrumentRow> = sqlx::query_as(
            r#"
            SELECT c.id::bigint AS id, c.symbol, e.id::bigint AS exchange_id
            FROM cryptos c
            JOIN exchanges_cryptos ec ON c.id = ec.crypto_id
            JOIN exchanges e ON ec.exchange_id = e.id
            WHERE LOWER(e.name) LIKE $1
              AND ($2 OR c.is_enabled = 1)
            ORDER BY c.id
            "#,
        )
        .bind(exchange_pattern(exchange_filter))
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Instrument::from).collect())
    }
}

#[async_trait]
impl InstrumentRegistry for PgInstrumentRegistry {
    async fn list_active_instruments(&self, exchange_filter: &str) -> Result<Vec<Instrument>> {
        self.query_instruments(exchange_filter, false).await
    }

    async fn list_all_instruments(&self, exchange_filter: &str) -> Result<Vec<Instrument>> {
        self.query_instruments(exchange_filter, true).await
    }

    async fn disable(&self, instrument_id: i64) -> Result<()> {
        sqlx::query("UPDATE cryptos SET is_enabled = 0 WHERE id = $1")
            .bind(instrument_id)
            .execute(&self.pool)
            .await?;

        info!(instrument_id, "종목 비활성화");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_pattern_is_lowercase_substring() {
        assert_eq!(exchange_pattern("Binance"), "%binance%");
        assert_eq!(exchange_pattern("  KRAKEN "), "%kraken%");
    }

    #[test]
    fn test_row_into_instrument() {
        let instrument: Instrument = InstrumentRow {
            id: 3,
            symbol: "SOL".to_string(),
            exchange_id: 1,
        }
        .into();
        assert_eq!(instrument, Instrument::new(3, "SOL", 1));
    }
}
