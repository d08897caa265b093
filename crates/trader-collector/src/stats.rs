//! 백필 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 백필 실행 통계
///
/// 처리 단위는 (종목, 윈도우) 쌍입니다.
/// `completed_units == fetched + empty + skipped + persist_errors`가 항상 성립합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillStats {
    /// 전체 처리 단위 수 (종목 수 × 윈도우 수)
    pub total_units: usize,
    /// 처리 완료 단위 수 (비활성화로 건너뛴 단위 포함)
    pub completed_units: usize,
    /// 캔들을 받아 저장한 단위
    pub fetched: usize,
    /// 조회 성공, 데이터 없음
    pub empty: usize,
    /// 건너뛴 단위 (일시 오류, 재시도 상한, 비활성화된 종목)
    pub skipped: usize,
    /// 요청 한도 초과 재시도 횟수
    pub rate_limit_retries: usize,
    /// 비활성화된 종목 수
    pub disabled_instruments: usize,
    /// 저장 실패 단위
    pub persist_errors: usize,
    /// 저장된 총 캔들 수
    pub candles_written: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BackfillStats {
    /// 새 통계 객체 생성
    pub fn new(total_units: usize) -> Self {
        Self {
            total_units,
            ..Default::default()
        }
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.completed_units == 0 {
            0.0
        } else {
            ((self.fetched + self.empty) as f64 / self.completed_units as f64) * 100.0
        }
    }

    /// 진행률 (%)
    pub fn progress_pct(&self) -> f64 {
        if self.total_units == 0 {
            100.0
        } else {
            (self.completed_units as f64 / self.total_units as f64) * 100.0
        }
    }

    /// 남은 예상 시간 (`elapsed × 남은 단위 / 완료 단위`).
    pub fn estimate_remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.completed_units == 0 {
            return None;
        }
        let remaining = self.total_units.saturating_sub(self.completed_units);
        Some(elapsed.mul_f64(remaining as f64 / self.completed_units as f64))
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total_units = self.total_units,
            completed_units = self.completed_units,
            fetched = self.fetched,
            empty = self.empty,
            skipped = self.skipped,
            rate_limit_retries = self.rate_limit_retries,
            disabled_instruments = self.disabled_instruments,
            persist_errors = self.persist_errors,
            candles_written = self.candles_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = %format_hms(self.elapsed),
            "백필 완료"
        );
    }
}

/// `HH:MM:SS` 형식 (시간은 24를 넘을 수 있음).
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
