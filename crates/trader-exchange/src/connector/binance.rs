//! Binance 과거 캔들 커넥터.
//!
//! Binance Spot 공개 REST API(`/api/v3/klines`)로 윈도우 단위 캔들을 조회합니다.
//! 인증이 필요 없는 엔드포인트만 사용합니다.

use crate::traits::{ExchangeResult, KlineFetcher};
use crate::ExchangeError;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};
use trader_core::{parse_decimal_str, Candle, Instrument, TimeWindow, Timeframe};

const KLINES_ENDPOINT: &str = "/api/v3/klines";

/// `/api/v3/klines`가 허용하는 요청당 최대 행 수.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Binance 캔들 조회 설정.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// 호가 자산 (페어 = 심볼 + 호가 자산)
    pub quote_asset: String,
    /// 캔들 간격
    pub interval: Timeframe,
    /// 요청당 최대 행 수 (`limit` 파라미터)
    pub max_rows: u32,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: "USDT".to_string(),
            interval: Timeframe::M1,
            max_rows: 1000,
            timeout_secs: 10,
        }
    }
}

impl BinanceConfig {
    /// 기본 URL 변경 (테스트 서버 등).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 요청당 최대 행 수 변경.
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// `limit` 값이 거래소 허용 범위(1..=1000)인지 확인.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.max_rows == 0 || self.max_rows > MAX_KLINE_LIMIT {
            return Err(ExchangeError::InvalidConfig(format!(
                "kline limit must be between 1 and {}: {}",
                MAX_KLINE_LIMIT, self.max_rows
            )));
        }
        Ok(())
    }

    /// 환경 변수에서 생성 (미설정 항목은 기본값).
    ///
    /// `BINANCE_KLINE_LIMIT`는 검증하지 않으므로 사용 전에 [`validate`](Self::validate)를 호출합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: std::env::var("BINANCE_BASE_URL").unwrap_or(defaults.base_url),
            quote_asset: std::env::var("BINANCE_QUOTE_ASSET").unwrap_or(defaults.quote_asset),
            interval: std::env::var("BINANCE_KLINE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.interval),
            max_rows: std::env::var("BINANCE_KLINE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_rows),
            timeout_secs: std::env::var("BINANCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

/// kline 행에서 필요한 최소 컬럼 수.
/// `[openTime, open, high, low, close, volume, closeTime,
///   quoteVolume, trades, takerBuyBase, takerBuyQuote, (ignore)]`
const KLINE_COLUMNS: usize = 11;

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance kline 조회 클라이언트.
pub struct BinanceKlineClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceKlineClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// `limit`이 허용 범위를 벗어나면 `ExchangeError::InvalidConfig`,
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// kline 요청 파라미터.
    ///
    /// Binance의 `endTime`은 포함 구간이므로 1ms를 빼서 `[start, end)`를 유지합니다.
    fn kline_params(&self, pair: &str, window: &TimeWindow) -> Vec<(&'static str, String)> {
        vec![
            ("symbol", pair.to_string()),
            ("interval", self.config.interval.to_binance_interval().to_string()),
            ("limit", self.config.max_rows.to_string()),
            ("startTime", window.start_ms().to_string()),
            ("endTime", (window.end_ms() - 1).to_string()),
        ]
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        pair: &str,
    ) -> ExchangeResult<Value> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        debug!(url = %url, ?params, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        self.handle_response(response, pair).await
    }

    /// API 응답 처리.
    async fn handle_response(&self, response: reqwest::Response, pair: &str) -> ExchangeResult<Value> {
        let status = response.status();
        let body = response.text().await.map_err(body_read_failed)?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            })
        } else if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
            Err(ExchangeError::from_status(
                status.as_u16(),
                pair,
                Some(error.code),
                error.msg,
            ))
        } else {
            Err(ExchangeError::from_status(status.as_u16(), pair, None, body))
        }
    }

    /// kline 응답 배열을 캔들 목록으로 변환.
    pub fn decode_klines(payload: &Value) -> ExchangeResult<Vec<Candle>> {
        let rows = payload
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("kline 응답이 배열이 아닙니다".to_string()))?;

        rows.iter()
            .map(|row| {
                let row = row.as_array().ok_or_else(|| {
                    ExchangeError::ParseError("kline 행이 배열이 아닙니다".to_string())
                })?;
                Self::decode_row(row)
            })
            .collect()
    }

    /// 고정 위치 kline 행 하나를 변환.
    fn decode_row(row: &[Value]) -> ExchangeResult<Candle> {
        if row.len() < KLINE_COLUMNS {
            return Err(ExchangeError::ParseError(format!(
                "kline 행 컬럼 수 부족: {} < {}",
                row.len(),
                KLINE_COLUMNS
            )));
        }

        Ok(Candle {
            open_time: int_at(row, 0)?,
            open: decimal_at(row, 1)?,
            high: decimal_at(row, 2)?,
            low: decimal_at(row, 3)?,
            close: decimal_at(row, 4)?,
            volume: decimal_at(row, 5)?,
            close_time: int_at(row, 6)?,
            base_asset_volume: decimal_at(row, 7)?,
            number_of_trades: int_at(row, 8)?,
            taker_buy_volume: decimal_at(row, 9)?,
            taker_buy_base_asset_volume: decimal_at(row, 10)?,
        })
    }
}

/// 상태 코드를 받은 뒤 본문을 읽지 못한 경우. 연결 실패가 아니라 응답 손상으로 취급합니다.
fn body_read_failed(err: impl std::fmt::Display) -> ExchangeError {
    ExchangeError::ParseError(format!("응답 본문 읽기 실패: {}", err))
}

fn int_at(row: &[Value], idx: usize) -> ExchangeResult<i64> {
    row[idx]
        .as_i64()
        .ok_or_else(|| ExchangeError::ParseError(format!("컬럼 {}: 정수가 아닙니다 ({})", idx, row[idx])))
}

fn decimal_at(row: &[Value], idx: usize) -> ExchangeResult<Decimal> {
    let parsed = match &row[idx] {
        Value::String(s) => parse_decimal_str(s),
        Value::Number(n) => parse_decimal_str(&n.to_string()),
        other => Err(format!("unexpected value {}", other)),
    };
    parsed.map_err(|e| ExchangeError::ParseError(format!("컬럼 {}: {}", idx, e)))
}

#[async_trait]
impl KlineFetcher for BinanceKlineClient {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        window: &TimeWindow,
    ) -> ExchangeResult<Vec<Candle>> {
        let pair = instrument.pair(&self.config.quote_asset);
        let params = self.kline_params(&pair, window);

        let payload = self.public_get(KLINES_ENDPOINT, &params, &pair).await?;
        let candles = Self::decode_klines(&payload)?;

        debug!(
            symbol = %pair,
            window = %window,
            count = candles.len(),
            "kline 조회 완료"
        );

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureClass;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_kline_params_half_open() {
        let client = BinanceKlineClient::new(BinanceConfig::default()).unwrap();
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        );

        let params = client.kline_params("BTCUSDT", &window);

        assert_eq!(
            params,
            vec![
                ("symbol", "BTCUSDT".to_string()),
                ("interval", "1m".to_string()),
                ("limit", "1000".to_string()),
                ("startTime", "1704067200000".to_string()),
                ("endTime", "1704088799999".to_string()),
            ]
        );
    }

    #[test]
    fn test_kline_limit_follows_config() {
        let client =
            BinanceKlineClient::new(BinanceConfig::default().with_max_rows(500)).unwrap();
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        );

        let params = client.kline_params("BTCUSDT", &window);
        assert!(params.contains(&("limit", "500".to_string())));
    }

    #[test]
    fn test_limit_outside_exchange_cap_is_rejected() {
        for rows in [0, MAX_KLINE_LIMIT + 1] {
            let config = BinanceConfig::default().with_max_rows(rows);
            assert!(matches!(config.validate(), Err(ExchangeError::InvalidConfig(_))));
            assert!(matches!(
                BinanceKlineClient::new(config),
                Err(ExchangeError::InvalidConfig(_))
            ));
        }
        assert!(BinanceConfig::default().with_max_rows(1).validate().is_ok());
        assert!(BinanceConfig::default()
            .with_max_rows(MAX_KLINE_LIMIT)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_body_read_failure_is_transient() {
        let err = body_read_failed("connection closed before message completed");
        assert!(matches!(err, ExchangeError::ParseError(_)));
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_decode_row_keeps_decimal_strings() {
        let payload = json!([[
            1704067200000_i64, "42283.58000000", "42298.62000000", "42261.02000000",
            "42298.61000000", "35.92724000", 1704067259999_i64, "1519065.66091030",
            1327, "19.35245000", "818285.30780660", "0"
        ]]);

        let candles = BinanceKlineClient::decode_klines(&payload).unwrap();
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.open_time, 1704067200000);
        assert_eq!(c.open, dec!(42283.58000000));
        assert_eq!(c.close, dec!(42298.61000000));
        assert_eq!(c.close_time, 1704067259999);
        assert_eq!(c.base_asset_volume, dec!(1519065.66091030));
        assert_eq!(c.number_of_trades, 1327);
        assert_eq!(c.taker_buy_base_asset_volume, dec!(818285.30780660));
    }

    #[test]
    fn test_decode_accepts_eleven_columns() {
        let payload = json!([[1, "1", "1", "1", "1", "1", 2, "1", 3, "1", "1"]]);
        assert_eq!(BinanceKlineClient::decode_klines(&payload).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_rejects_malformed_rows() {
        assert!(BinanceKlineClient::decode_klines(&json!({"code": 0})).is_err());
        assert!(BinanceKlineClient::decode_klines(&json!([[1, "1", "1"]])).is_err());
        assert!(BinanceKlineClient::decode_klines(&json!([[
            1, "x", "1", "1", "1", "1", 2, "1", 3, "1", "1"
        ]]))
        .is_err());
        assert!(BinanceKlineClient::decode_klines(&json!([])).unwrap().is_empty());
    }
}
