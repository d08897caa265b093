//! 요청 한도/에러 분류 기반 재시도 컨트롤러.
//!
//! (종목, 윈도우) 단위 조회 시도의 상태 전이:
//!
//! ```text
//! ATTEMPTING ──[성공]──────────> SUCCESS
//!     │  ↑
//!     │  └──[지연 후]── RATE_LIMITED      (429/418, 상태 코드 없는 연결 실패)
//!     ├──[400]─────────> DISABLE_INSTRUMENT
//!     └──[기타]────────> SKIP_WINDOW       (타임아웃, 파싱 실패, 5xx)
//! ```
//!
//! 요청 한도 초과는 기본적으로 횟수 제한 없이 같은 윈도우를 재시도합니다.
//! 필요하면 `max_rate_limit_retries`로 상한을, `rate_limit_jitter`로 지터를 설정합니다.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{info, warn};
use trader_core::{Candle, Instrument, TimeWindow};

use crate::{ExchangeError, FailureClass, KlineFetcher};

/// 재시도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 요청 한도 초과 시 대기 시간
    pub rate_limit_delay: Duration,
    /// 대기 시간에 더해지는 최대 무작위 지터
    pub rate_limit_jitter: Duration,
    /// 요청 한도 초과 재시도 상한 (`None`이면 무제한)
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_delay: Duration::from_secs(60),
            rate_limit_jitter: Duration::ZERO,
            max_rate_limit_retries: None,
        }
    }
}

impl RetryPolicy {
    /// 장시간 배치용 정책 (15분 대기).
    pub fn patient() -> Self {
        Self {
            rate_limit_delay: Duration::from_secs(15 * 60),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.rate_limit_jitter = jitter;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_rate_limit_retries = max_retries;
        self
    }

    /// 이번 재시도 전 대기 시간 (지연 + 지터).
    pub fn backoff_delay(&self) -> Duration {
        let jitter_ms = self.rate_limit_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.rate_limit_delay;
        }
        self.rate_limit_delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// 한 (종목, 윈도우) 조회의 최종 결과.
#[derive(Debug)]
pub enum FetchOutcome {
    /// 조회 성공 (빈 목록 포함)
    Fetched { candles: Vec<Candle>, attempts: u32 },
    /// 영구 실패: 종목 비활성화 필요
    DisableInstrument { error: ExchangeError },
    /// 일시 실패 또는 재시도 상한 도달: 윈도우 건너뜀
    SkipWindow { error: ExchangeError, attempts: u32 },
}

impl FetchOutcome {
    /// 요청 한도 초과로 추가 시도한 횟수.
    pub fn retries(&self) -> u32 {
        match self {
            FetchOutcome::Fetched { attempts, .. } | FetchOutcome::SkipWindow { attempts, .. } => {
                attempts.saturating_sub(1)
            }
            FetchOutcome::DisableInstrument { .. } => 0,
        }
    }
}

/// 재시도 컨트롤러.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 분류 정책에 따라 조회를 수행합니다.
    ///
    /// 윈도우 경계는 재시도 중에도 바뀌지 않습니다.
    pub async fn run(
        &self,
        fetcher: &dyn KlineFetcher,
        instrument: &Instrument,
        window: &TimeWindow,
    ) -> FetchOutcome {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let error = match fetcher.fetch(instrument, window).await {
                Ok(candles) => return FetchOutcome::Fetched { candles, attempts },
                Err(e) => e,
            };

            match error.failure_class() {
                FailureClass::RateLimited => {
                    if let Some(max) = self.policy.max_rate_limit_retries {
                        if attempts > max {
                            warn!(
                                symbol = %instrument.symbol,
                                window_start = %window.start,
                                window_end = %window.end,
                                attempts,
                                error = %error,
                                "재시도 상한 도달, 윈도우 건너뜀"
                            );
                            return FetchOutcome::SkipWindow { error, attempts };
                        }
                    }

                    let delay = self.policy.backoff_delay();
                    info!(
                        symbol = %instrument.symbol,
                        window_start = %window.start,
                        window_end = %window.end,
                        attempt = attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %error,
                        "요청 한도 초과, 대기 후 같은 윈도우 재시도"
                    );
                    sleep(delay).await;
                }
                FailureClass::Permanent => {
                    warn!(
                        symbol = %instrument.symbol,
                        window_start = %window.start,
                        window_end = %window.end,
                        error = %error,
                        "거래소가 종목을 거부함, 비활성화 대상"
                    );
                    return FetchOutcome::DisableInstrument { error };
                }
                FailureClass::Transient => {
                    warn!(
                        symbol = %instrument.symbol,
                        window_start = %window.start,
                        window_end = %window.end,
                        error = %error,
                        "조회 실패, 윈도우 건너뜀"
                    );
                    return FetchOutcome::SkipWindow { error, attempts };
                }
            }
        }
    }
}
