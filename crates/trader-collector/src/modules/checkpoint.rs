//! 백필 체크포인트 관리 모듈.
//!
//! 장시간 실행되는 백필 작업의 중단/재개를 지원합니다.
//!
//! # 주요 기능
//!
//! - **체크포인트 저장**: 윈도우 하나를 모든 종목에 대해 처리할 때마다 저장
//! - **중단점 재개**: 같은 범위/방향의 미완료 작업은 남은 구간만 처리
//!
//! # 사용 예
//!
//! ```rust,ignore
//! let store = PgCheckpointStore::new(pool.clone());
//! let runner = BackfillRunner::new(fetcher, sink, registry, planner, options)
//!     .with_checkpoints(Arc::new(store));
//!
//! // 중단된 지점부터 이어서 처리
//! let stats = runner.resume(range).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;
use trader_core::{PlanDirection, TimeWindow};

use super::backfill::BackfillRange;
use crate::error::CollectorError;
use crate::Result;

/// 체크포인트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    /// 실행 중
    Running,
    /// 중단됨 (재개 가능)
    Interrupted,
    /// 완료됨
    Completed,
}

impl CheckpointStatus {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "interrupted" => Ok(Self::Interrupted),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown checkpoint status: {}", s)),
        }
    }
}

/// 백필 워크플로우 체크포인트
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub workflow_name: String,
    /// 원래 요청된 범위
    pub range: BackfillRange,
    pub direction: PlanDirection,
    /// 마지막으로 모든 종목 처리가 끝난 윈도우
    pub last_window: Option<TimeWindow>,
    pub windows_done: i32,
    pub status: CheckpointStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(workflow_name: impl Into<String>, range: BackfillRange, direction: PlanDirection) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            range,
            direction,
            last_window: None,
            windows_done: 0,
            status: CheckpointStatus::Running,
            updated_at: None,
        }
    }

    /// 윈도우 완료 기록.
    pub fn record_window(&mut self, window: TimeWindow) {
        self.last_window = Some(window);
        self.windows_done += 1;
        self.status = CheckpointStatus::Running;
    }

    /// 같은 범위/방향으로 시작된 체크포인트인지 여부.
    pub fn matches(&self, requested: &BackfillRange, direction: PlanDirection) -> bool {
        self.range == *requested && self.direction == direction
    }

    /// 요청 범위에 대해 아직 처리하지 않은 구간.
    ///
    /// 범위나 방향이 다르거나 완료된 윈도우가 없으면 `None` (처음부터 실행).
    /// 완료된 체크포인트는 빈 구간을 반환합니다.
    pub fn remaining_range(
        &self,
        requested: &BackfillRange,
        direction: PlanDirection,
    ) -> Option<BackfillRange> {
        if !self.matches(requested, direction) {
            return None;
        }

        if self.status == CheckpointStatus::Completed {
            return Some(BackfillRange::new(requested.end, requested.end));
        }

        let last = self.last_window?;
        let remaining = match direction {
            PlanDirection::Forward => BackfillRange::new(last.end, requested.end),
            PlanDirection::Backward => BackfillRange::new(requested.start, last.start),
        };
        Some(remaining)
    }
}

/// 체크포인트 저장소 인터페이스.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn load(&self, workflow: &str) -> Result<Option<Checkpoint>>;

    async fn clear(&self, workflow: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<Checkpoint>>;
}

#[derive(Debug, FromRow)]
struct CheckpointRow {
    workflow_name: String,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    direction: String,
    last_window_start: Option<DateTime<Utc>>,
    last_window_end: Option<DateTime<Utc>>,
    windows_done: i32,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = CollectorError;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        let direction = row.direction.parse().map_err(CollectorError::Config)?;
        let status = row.status.parse().map_err(CollectorError::Config)?;
        let last_window = match (row.last_window_start, row.last_window_end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        };

        Ok(Self {
            workflow_name: row.workflow_name,
            range: BackfillRange::new(row.range_start, row.range_end),
            direction,
            last_window,
            windows_done: row.windows_done,
            status,
            updated_at: Some(row.updated_at),
        })
    }
}

/// PostgreSQL 체크포인트 저장소 (`backfill_checkpoint`).
#[derive(Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backfill_checkpoint
                (workflow_name, range_start, range_end, direction, last_window_start,
                 last_window_end, windows_done, status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (workflow_name)
            DO UPDATE SET
                range_start = EXCLUDED.range_start,
                range_end = EXCLUDED.range_end,
                direction = EXCLUDED.direction,
                last_window_start = EXCLUDED.last_window_start,
                last_window_end = EXCLUDED.last_window_end,
                windows_done = EXCLUDED.windows_done,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(&checkpoint.workflow_name)
        .bind(checkpoint.range.start)
        .bind(checkpoint.range.end)
        .bind(checkpoint.direction.as_str())
        .bind(checkpoint.last_window.map(|w| w.start))
        .bind(checkpoint.last_window.map(|w| w.end))
        .bind(checkpoint.windows_done)
        .bind(checkpoint.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, workflow: &str) -> Result<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT workflow_name, range_start, range_end, direction, last_window_start,
                   last_window_end, windows_done, status, updated_at
            FROM backfill_checkpoint
            WHERE workflow_name = $1
            "#,
        )
        .bind(workflow)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Checkpoint::try_from).transpose()
    }

    async fn clear(&self, workflow: &str) -> Result<()> {
        sqlx::query("DELETE FROM backfill_checkpoint WHERE workflow_name = $1")
            .bind(workflow)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT workflow_name, range_start, range_end, direction, last_window_start,
                   last_window_end, windows_done, status, updated_at
            FROM backfill_checkpoint
            ORDER BY workflow_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Checkpoint::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn range() -> BackfillRange {
        BackfillRange::new(ts(1, 0), ts(3, 0))
    }

    #[test]
    fn test_matches_requires_same_range_and_direction() {
        let cp = Checkpoint::new("wf", range(), PlanDirection::Backward);
        assert!(cp.matches(&range(), PlanDirection::Backward));
        assert!(!cp.matches(&range(), PlanDirection::Forward));
        assert!(!cp.matches(&BackfillRange::new(ts(1, 0), ts(4, 0)), PlanDirection::Backward));
    }

    #[test]
    fn test_remaining_range_forward() {
        let mut cp = Checkpoint::new("wf", range(), PlanDirection::Forward);
        cp.record_window(TimeWindow::new(ts(1, 0), ts(1, 6)));
        cp.record_window(TimeWindow::new(ts(1, 6), ts(1, 12)));

        assert_eq!(cp.windows_done, 2);
        assert_eq!(
            cp.remaining_range(&range(), PlanDirection::Forward),
            Some(BackfillRange::new(ts(1, 12), ts(3, 0)))
        );
    }

    #[test]
    fn test_remaining_range_backward() {
        let mut cp = Checkpoint::new("wf", range(), PlanDirection::Backward);
        cp.record_window(TimeWindow::new(ts(2, 18), ts(3, 0)));

        assert_eq!(
            cp.remaining_range(&range(), PlanDirection::Backward),
            Some(BackfillRange::new(ts(1, 0), ts(2, 18)))
        );
    }

    #[test]
    fn test_remaining_range_mismatch_restarts() {
        let mut cp = Checkpoint::new("wf", range(), PlanDirection::Backward);
        cp.record_window(TimeWindow::new(ts(2, 18), ts(3, 0)));

        assert_eq!(cp.remaining_range(&range(), PlanDirection::Forward), None);
        assert_eq!(
            cp.remaining_range(&BackfillRange::new(ts(1, 0), ts(2, 0)), PlanDirection::Backward),
            None
        );
        assert_eq!(
            Checkpoint::new("wf", range(), PlanDirection::Backward)
                .remaining_range(&range(), PlanDirection::Backward),
            None
        );
    }

    #[test]
    fn test_completed_checkpoint_leaves_nothing() {
        let mut cp = Checkpoint::new("wf", range(), PlanDirection::Forward);
        cp.record_window(TimeWindow::new(ts(1, 0), ts(3, 0)));
        cp.status = CheckpointStatus::Completed;

        let remaining = cp.remaining_range(&range(), PlanDirection::Forward).unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            CheckpointStatus::Running,
            CheckpointStatus::Interrupted,
            CheckpointStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<CheckpointStatus>().unwrap(), status);
        }
        assert!("idle".parse::<CheckpointStatus>().is_err());
    }
}
