//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::modules::backfill::{BackfillOptions, BackfillRange};
use crate::Result;
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::str::FromStr;
use std::time::Duration;
use trader_core::{ChunkPolicy, PlanDirection, WindowPlanner};
use trader_exchange::{BinanceConfig, RetryPolicy};

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 풀의 최대 연결 수
    pub database_max_connections: u32,
    /// 백필 설정
    pub backfill: BackfillConfig,
    /// Binance 조회 설정
    pub binance: BinanceConfig,
}

/// 백필 설정
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// 수집 시작 날짜 (포함)
    pub start_date: Option<NaiveDate>,
    /// 수집 종료 날짜 (제외, 해당 날짜 00:00 UTC까지)
    pub end_date: Option<NaiveDate>,
    /// 윈도우 분할 정책
    pub chunk: ChunkPolicy,
    /// 윈도우 순회 방향
    pub direction: PlanDirection,
    /// 거래소 이름 필터 (부분 일치)
    pub exchange: String,
    /// API 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 요청 한도 초과 시 대기 시간 (초)
    pub rate_limit_delay_secs: u64,
    /// 대기 시간 지터 (밀리초)
    pub rate_limit_jitter_ms: u64,
    /// 요청 한도 초과 재시도 상한 (미설정 시 무제한)
    pub max_rate_limit_retries: Option<u32>,
    /// 비활성 종목도 수집
    pub include_disabled: bool,
    /// 체크포인트 워크플로우 이름
    pub workflow: String,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            chunk: ChunkPolicy::default(),
            direction: PlanDirection::default(),
            exchange: "binance".to_string(),
            request_delay_ms: 0,
            rate_limit_delay_secs: 60,
            rate_limit_jitter_ms: 0,
            max_rate_limit_retries: None,
            include_disabled: false,
            workflow: "binance_backfill".to_string(),
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let defaults = BackfillConfig::default();

        Ok(Self {
            database_url,
            database_max_connections: env_var_parse("DATABASE_MAX_CONNECTIONS", 1),
            backfill: BackfillConfig {
                start_date: env_var_date("BACKFILL_START_DATE")?,
                end_date: env_var_date("BACKFILL_END_DATE")?,
                chunk: env_var_strict("BACKFILL_CHUNK")?.unwrap_or(defaults.chunk),
                direction: env_var_strict("BACKFILL_DIRECTION")?.unwrap_or(defaults.direction),
                exchange: std::env::var("BACKFILL_EXCHANGE").unwrap_or(defaults.exchange),
                request_delay_ms: env_var_parse("BACKFILL_REQUEST_DELAY_MS", defaults.request_delay_ms),
                rate_limit_delay_secs: env_var_parse(
                    "BACKFILL_RATE_LIMIT_DELAY_SECS",
                    defaults.rate_limit_delay_secs,
                ),
                rate_limit_jitter_ms: env_var_parse(
                    "BACKFILL_RATE_LIMIT_JITTER_MS",
                    defaults.rate_limit_jitter_ms,
                ),
                max_rate_limit_retries: env_var_strict("BACKFILL_MAX_RATE_LIMIT_RETRIES")?,
                include_disabled: env_var_strict("BACKFILL_INCLUDE_DISABLED")?
                    .unwrap_or(defaults.include_disabled),
                workflow: std::env::var("BACKFILL_WORKFLOW").unwrap_or(defaults.workflow),
            },
            binance: binance_from_env()?,
        })
    }

    /// 검증된 `limit`과 같은 행 수 제한을 쓰는 윈도우 계획기.
    pub fn planner(&self) -> WindowPlanner {
        WindowPlanner::new(self.binance.interval, self.binance.max_rows)
    }
}

/// Binance 설정 로드. `BINANCE_KLINE_LIMIT`는 거래소 허용 범위만 받습니다.
fn binance_from_env() -> Result<BinanceConfig> {
    let mut config = BinanceConfig::from_env();
    if let Some(limit) = env_var_strict::<u32>("BINANCE_KLINE_LIMIT")? {
        config.max_rows = limit;
    }
    validate_binance(config)
}

fn validate_binance(config: BinanceConfig) -> Result<BinanceConfig> {
    config
        .validate()
        .map_err(|e| CollectorError::Config(format!("BINANCE_KLINE_LIMIT: {}", e)))?;
    Ok(config)
}

impl BackfillConfig {
    /// API 요청 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_delay(Duration::from_secs(self.rate_limit_delay_secs))
            .with_jitter(Duration::from_millis(self.rate_limit_jitter_ms))
            .with_max_retries(self.max_rate_limit_retries)
    }

    /// 백필 범위 결정.
    ///
    /// 종료일 미설정 시 `today`, 시작일 미설정 시 종료일 하루 전.
    pub fn range(&self, today: NaiveDate) -> BackfillRange {
        let end = self.end_date.unwrap_or(today);
        let start = self.start_date.unwrap_or(end - ChronoDuration::days(1));
        BackfillRange::from_dates(start, end)
    }

    /// 오케스트레이터 옵션
    pub fn options(&self) -> BackfillOptions {
        BackfillOptions {
            exchange_filter: self.exchange.clone(),
            chunk_policy: self.chunk,
            direction: self.direction,
            request_delay: self.request_delay(),
            symbols: None,
            include_disabled: self.include_disabled,
            workflow: self.workflow.clone(),
        }
    }
}

/// 쉼표로 구분된 심볼 목록 파싱
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 값을 파싱 (설정되었지만 잘못된 값이면 에러)
fn env_var_strict<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CollectorError::Config(format!("{}: {}", key, e))),
        _ => Ok(None),
    }
}

/// 환경변수에서 날짜 파싱 (YYYY-MM-DD)
fn env_var_date(key: &str) -> Result<Option<NaiveDate>> {
    env_var_strict::<NaiveDate>(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_range_is_previous_day() {
        let config = BackfillConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let range = config.range(today);

        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_explicit_range() {
        let config = BackfillConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 3),
            ..Default::default()
        };
        let range = config.range(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        assert_eq!(range.end - range.start, ChronoDuration::days(2));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = BackfillConfig {
            rate_limit_delay_secs: 900,
            rate_limit_jitter_ms: 250,
            max_rate_limit_retries: Some(5),
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.rate_limit_delay, Duration::from_secs(900));
        assert_eq!(policy.rate_limit_jitter, Duration::from_millis(250));
        assert_eq!(policy.max_rate_limit_retries, Some(5));
    }

    #[test]
    fn test_parse_symbol_list() {
        assert_eq!(parse_symbol_list("btc, eth,,SOL "), vec!["BTC", "ETH", "SOL"]);
        assert!(parse_symbol_list("").is_empty());
    }

    #[test]
    fn test_kline_limit_outside_cap_is_config_error() {
        for rows in [0, 1001] {
            let result = validate_binance(BinanceConfig::default().with_max_rows(rows));
            assert!(matches!(result, Err(CollectorError::Config(_))), "limit {}", rows);
        }
        assert!(validate_binance(BinanceConfig::default().with_max_rows(1000)).is_ok());
    }

    #[test]
    fn test_planner_uses_request_limit() {
        let config = CollectorConfig {
            database_url: "postgresql://localhost/prices".to_string(),
            database_max_connections: 1,
            backfill: BackfillConfig::default(),
            binance: BinanceConfig::default().with_max_rows(500),
        };
        let planner = config.planner();
        assert_eq!(planner.max_rows(), 500);
        assert_eq!(planner.chunk_size(ChunkPolicy::MaxRows), ChronoDuration::minutes(500));
    }

    #[test]
    fn test_options_from_config() {
        let options = BackfillConfig::default().options();
        assert_eq!(options.exchange_filter, "binance");
        assert_eq!(options.chunk_policy, ChunkPolicy::default());
        assert_eq!(options.direction, PlanDirection::Backward);
        assert_eq!(options.request_delay, Duration::ZERO);
        assert!(!options.include_disabled);

        let options = BackfillConfig {
            include_disabled: true,
            ..Default::default()
        }
        .options();
        assert!(options.include_disabled);
    }
}
