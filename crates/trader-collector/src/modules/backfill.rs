//! 과거 캔들 백필 모듈.
//!
//! 활성 종목 × 시간 윈도우를 하나씩 순차 처리합니다.
//! 윈도우 우선 순회: 한 윈도우를 모든 종목에 대해 끝낸 뒤 다음 윈도우로 넘어갑니다.
//!
//! 단위별 처리 흐름:
//!
//! ```text
//! fetch (재시도 컨트롤러)
//!   ├─ Fetched(비어있지 않음) → upsert → fetched / persist_errors
//!   ├─ Fetched(빈 목록)       → empty
//!   ├─ DisableInstrument      → registry.disable, 남은 윈도우 skipped
//!   └─ SkipWindow             → skipped
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument as _, Span};
use trader_core::{ChunkPolicy, Instrument, PlanDirection, TimeWindow, WindowPlanner};
use trader_data::{CandleSink, InstrumentRegistry};
use trader_exchange::{FetchOutcome, KlineFetcher, RetryController};

use super::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::error::CollectorError;
use crate::stats::{format_hms, BackfillStats};
use crate::Result;

/// 백필 대상 전체 구간 `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BackfillRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// 날짜 범위 (시작일 00:00 UTC ~ 종료일 00:00 UTC).
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.and_time(NaiveTime::MIN).and_utc(),
            end: end.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for BackfillRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// 백필 옵션
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// 거래소 이름 필터 (부분 일치, 대소문자 무시)
    pub exchange_filter: String,
    /// 윈도우 분할 정책
    pub chunk_policy: ChunkPolicy,
    /// 윈도우 순회 방향
    pub direction: PlanDirection,
    /// 단위 처리 사이 딜레이
    pub request_delay: Duration,
    /// 특정 심볼만 처리 (대소문자 무시)
    pub symbols: Option<Vec<String>>,
    /// 비활성 종목도 포함
    pub include_disabled: bool,
    /// 체크포인트 워크플로우 이름
    pub workflow: String,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            exchange_filter: "binance".to_string(),
            chunk_policy: ChunkPolicy::default(),
            direction: PlanDirection::default(),
            request_delay: Duration::ZERO,
            symbols: None,
            include_disabled: false,
            workflow: "binance_backfill".to_string(),
        }
    }
}

/// 백필 오케스트레이터.
pub struct BackfillRunner {
    fetcher: Arc<dyn KlineFetcher>,
    sink: Arc<dyn CandleSink>,
    registry: Arc<dyn InstrumentRegistry>,
    retry: RetryController,
    planner: WindowPlanner,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    span: Span,
    options: BackfillOptions,
}

impl BackfillRunner {
    pub fn new(
        fetcher: Arc<dyn KlineFetcher>,
        sink: Arc<dyn CandleSink>,
        registry: Arc<dyn InstrumentRegistry>,
        planner: WindowPlanner,
        options: BackfillOptions,
    ) -> Self {
        let span = trader_core::backfill_span!(options.workflow, fetcher.name());
        Self {
            fetcher,
            sink,
            registry,
            retry: RetryController::default(),
            planner,
            checkpoints: None,
            span,
            options,
        }
    }

    pub fn with_retry(mut self, retry: RetryController) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// 모든 단위 로그가 기록될 span 지정.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn options(&self) -> &BackfillOptions {
        &self.options
    }

    /// `range` 전체를 백필합니다.
    pub async fn run(&self, range: BackfillRange) -> Result<BackfillStats> {
        let checkpoint = Checkpoint::new(&self.options.workflow, range, self.options.direction);
        self.execute(range, checkpoint)
            .instrument(self.span.clone())
            .await
    }

    /// 체크포인트가 있으면 남은 구간만, 없으면 `range` 전체를 백필합니다.
    pub async fn resume(&self, range: BackfillRange) -> Result<BackfillStats> {
        let previous = match &self.checkpoints {
            Some(store) => match store.load(&self.options.workflow).await {
                Ok(cp) => cp,
                Err(e) => {
                    warn!(workflow = %self.options.workflow, error = %e, "체크포인트 로드 실패, 처음부터 실행");
                    None
                }
            },
            None => None,
        };

        if let Some(cp) = &previous {
            if !cp.matches(&range, self.options.direction) {
                warn!(
                    workflow = %self.options.workflow,
                    stored_range = %cp.range,
                    stored_direction = %cp.direction,
                    requested_range = %range,
                    requested_direction = %self.options.direction,
                    "체크포인트 범위/방향 불일치, 처음부터 실행"
                );
            }
        }

        let resumed = previous.and_then(|cp| {
            cp.remaining_range(&range, self.options.direction)
                .map(|remaining| (cp, remaining))
        });

        match resumed {
            Some((checkpoint, remaining)) => {
                info!(
                    workflow = %self.options.workflow,
                    windows_done = checkpoint.windows_done,
                    remaining = %remaining,
                    "체크포인트에서 재개"
                );
                self.execute(remaining, checkpoint)
                    .instrument(self.span.clone())
                    .await
            }
            None => self.run(range).await,
        }
    }

    async fn execute(&self, range: BackfillRange, mut checkpoint: Checkpoint) -> Result<BackfillStats> {
        let started = Instant::now();

        let instruments = self.target_instruments().await?;
        let windows = self.planner.plan(
            range.start,
            range.end,
            self.options.chunk_policy,
            self.options.direction,
        );

        let mut stats = BackfillStats::new(instruments.len() * windows.len());

        if instruments.is_empty() || windows.is_empty() {
            warn!(
                instruments = instruments.len(),
                windows = windows.len(),
                range = %range,
                "처리할 단위가 없습니다"
            );
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        info!(
            instruments = instruments.len(),
            windows = windows.len(),
            total_units = stats.total_units,
            range = %range,
            chunk = %self.options.chunk_policy,
            direction = %self.options.direction,
            "백필 시작"
        );

        let mut disabled: HashSet<i64> = HashSet::new();

        for (window_idx, window) in windows.iter().enumerate() {
            let remaining_windows = windows.len() - window_idx - 1;

            for instrument in &instruments {
                if disabled.contains(&instrument.id) {
                    continue;
                }

                let outcome = self.retry.run(self.fetcher.as_ref(), instrument, window).await;
                stats.rate_limit_retries += outcome.retries() as usize;

                match outcome {
                    FetchOutcome::Fetched { candles, .. } if candles.is_empty() => {
                        stats.empty += 1;
                        debug!(symbol = %instrument.symbol, window = %window, "데이터 없음");
                    }
                    FetchOutcome::Fetched { candles, .. } => {
                        match self.sink.upsert(instrument, &candles).await {
                            Ok(written) => {
                                stats.fetched += 1;
                                stats.candles_written += written;
                            }
                            Err(e) if e.is_connection_fatal() => {
                                error!(
                                    symbol = %instrument.symbol,
                                    window_start = %window.start,
                                    window_end = %window.end,
                                    error = %e,
                                    "저장소 연결 끊김, 백필 중단"
                                );
                                checkpoint.status = CheckpointStatus::Interrupted;
                                self.save_checkpoint(&checkpoint).await;
                                return Err(CollectorError::Data(e));
                            }
                            Err(e) => {
                                stats.persist_errors += 1;
                                error!(
                                    symbol = %instrument.symbol,
                                    window_start = %window.start,
                                    window_end = %window.end,
                                    error = %e,
                                    "저장 실패"
                                );
                            }
                        }
                    }
                    FetchOutcome::DisableInstrument { error } => {
                        if let Err(e) = self.registry.disable(instrument.id).await {
                            error!(
                                symbol = %instrument.symbol,
                                instrument_id = instrument.id,
                                error = %e,
                                "종목 비활성화 실패"
                            );
                        }
                        disabled.insert(instrument.id);
                        stats.disabled_instruments += 1;
                        stats.skipped += 1 + remaining_windows;
                        stats.completed_units += remaining_windows;
                        warn!(
                            symbol = %instrument.symbol,
                            window_start = %window.start,
                            window_end = %window.end,
                            skipped_windows = remaining_windows,
                            error = %error,
                            "종목 비활성화, 남은 윈도우 건너뜀"
                        );
                    }
                    FetchOutcome::SkipWindow { .. } => {
                        stats.skipped += 1;
                    }
                }

                stats.completed_units += 1;
                self.log_progress(&stats, started.elapsed(), instrument, window);

                if !self.options.request_delay.is_zero() {
                    tokio::time::sleep(self.options.request_delay).await;
                }
            }

            checkpoint.record_window(*window);
            self.save_checkpoint(&checkpoint).await;
        }

        checkpoint.status = CheckpointStatus::Completed;
        self.save_checkpoint(&checkpoint).await;

        stats.elapsed = started.elapsed();
        stats.log_summary("백필");
        Ok(stats)
    }

    /// 레지스트리에서 대상 종목 조회 후 심볼 필터 적용.
    async fn target_instruments(&self) -> Result<Vec<Instrument>> {
        let listed = if self.options.include_disabled {
            self.registry
                .list_all_instruments(&self.options.exchange_filter)
                .await
        } else {
            self.registry
                .list_active_instruments(&self.options.exchange_filter)
                .await
        };

        let instruments = listed.map_err(|e| {
            error!(exchange = %self.options.exchange_filter, error = %e, "종목 조회 실패");
            CollectorError::Connection(e.to_string())
        })?;

        let instruments = match &self.options.symbols {
            Some(symbols) => instruments
                .into_iter()
                .filter(|i| symbols.iter().any(|s| s.eq_ignore_ascii_case(&i.symbol)))
                .collect(),
            None => instruments,
        };

        Ok(instruments)
    }

    fn log_progress(
        &self,
        stats: &BackfillStats,
        elapsed: Duration,
        instrument: &Instrument,
        window: &TimeWindow,
    ) {
        let eta = stats
            .estimate_remaining(elapsed)
            .map(format_hms)
            .unwrap_or_else(|| "--:--:--".to_string());

        info!(
            symbol = %instrument.symbol,
            window = %window,
            progress = format!("{}/{}", stats.completed_units, stats.total_units),
            pct = format!("{:.1}%", stats.progress_pct()),
            elapsed = %format_hms(elapsed),
            eta = %eta,
            "진행"
        );
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) {
        let Some(store) = &self.checkpoints else {
            return;
        };

        if let Err(e) = store.save(checkpoint).await {
            warn!(
                workflow = %checkpoint.workflow_name,
                status = %checkpoint.status,
                error = %e,
                "체크포인트 저장 실패"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_range_from_dates() {
        let range = BackfillRange::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        );
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap());
        assert!(!range.is_empty());
        assert_eq!(range.to_string(), "2024-01-01 00:00 -> 2024-01-03 00:00");
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = BackfillRange::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(range.is_empty());
    }
}
