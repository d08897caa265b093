//! 백필 시간 윈도우 계획.
//!
//! 전체 수집 구간 `[start, end)`를 거래소 요청 1회로 가져올 수 있는 크기의
//! 반열린 구간들로 나눕니다.
//!
//! # 보장 사항
//!
//! - 윈도우들은 전체 구간을 빈틈/중복 없이 정확히 한 번씩 덮습니다.
//! - 모든 윈도우의 `길이 / 캔들 간격`은 `max_rows` 이하입니다.
//! - 경계 윈도우는 잘려서 더 짧아질 수는 있어도 더 길어지지 않습니다.
//!
//! # 사용 예
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use trader_core::{ChunkPolicy, PlanDirection, Timeframe, WindowPlanner};
//!
//! let planner = WindowPlanner::new(Timeframe::M1, 1500);
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
//! let policy: ChunkPolicy = "1d".parse().unwrap();
//!
//! let windows = planner.plan(start, end, policy, PlanDirection::Forward);
//! assert_eq!(windows.len(), 2);
//! ```

use crate::types::Timeframe;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 반열린 시간 구간 `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// 구간 길이.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// 시각이 구간에 포함되는지 확인 (end 제외).
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// 구간에 들어갈 수 있는 최대 캔들 수.
    pub fn expected_rows(&self, interval: Timeframe) -> i64 {
        let span = self.duration().num_milliseconds().max(0);
        let step = interval.as_millis();
        (span + step - 1) / step
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// 윈도우 크기 정책.
///
/// 일 단위, 6시간 단위, N일 배치, 행 수 기반 분할을 하나의 설정값으로 표현합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// 고정 길이 (예: "6h", "1d", "3d")
    Fixed(Duration),
    /// 캔들 N개 분량 (예: "rows:1440")
    Rows(u32),
    /// 요청당 최대 행 수 분량 ("max")
    MaxRows,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::hours(6))
    }
}

impl FromStr for ChunkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        if s == "max" {
            return Ok(Self::MaxRows);
        }

        if let Some(rows) = s.strip_prefix("rows:") {
            let rows: u32 = rows
                .parse()
                .map_err(|_| format!("Invalid chunk row count: {}", s))?;
            if rows == 0 {
                return Err("Chunk row count must be positive".to_string());
            }
            return Ok(Self::Rows(rows));
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Missing chunk unit: {}", s))?;
        let (amount, unit) = s.split_at(split);
        let amount: i64 = amount
            .parse()
            .map_err(|_| format!("Invalid chunk size: {}", s))?;
        if amount <= 0 {
            return Err(format!("Chunk size must be positive: {}", s));
        }

        let duration = match unit {
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            "w" => Duration::try_weeks(amount),
            _ => return Err(format!("Unknown chunk unit: {}", unit)),
        };

        duration
            .map(Self::Fixed)
            .ok_or_else(|| format!("Chunk size out of range: {}", s))
    }
}

impl fmt::Display for ChunkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxRows => write!(f, "max"),
            Self::Rows(rows) => write!(f, "rows:{}", rows),
            Self::Fixed(d) => {
                let minutes = d.num_minutes();
                if minutes % (24 * 60) == 0 {
                    write!(f, "{}d", minutes / (24 * 60))
                } else if minutes % 60 == 0 {
                    write!(f, "{}h", minutes / 60)
                } else {
                    write!(f, "{}m", minutes)
                }
            }
        }
    }
}

/// 윈도우 진행 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanDirection {
    /// 과거 → 최근
    Forward,
    /// 최근 → 과거
    Backward,
}

impl Default for PlanDirection {
    fn default() -> Self {
        Self::Backward
    }
}

impl PlanDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

impl fmt::Display for PlanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" | "asc" => Ok(Self::Forward),
            "backward" | "desc" => Ok(Self::Backward),
            _ => Err(format!("Unknown plan direction: {}", s)),
        }
    }
}

/// 윈도우 계획기.
#[derive(Debug, Clone, Copy)]
pub struct WindowPlanner {
    interval: Timeframe,
    max_rows: u32,
}

impl WindowPlanner {
    /// 캔들 간격과 요청당 최대 행 수로 계획기 생성.
    pub fn new(interval: Timeframe, max_rows: u32) -> Self {
        Self {
            interval,
            max_rows: max_rows.max(1),
        }
    }

    pub fn interval(&self) -> Timeframe {
        self.interval
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// 요청 1회로 가져올 수 있는 최대 구간 길이.
    pub fn max_chunk(&self) -> Duration {
        Duration::milliseconds(self.interval.as_millis() * self.max_rows as i64)
    }

    /// 정책에 따른 실제 윈도우 크기 (최대 행 수로 제한).
    pub fn chunk_size(&self, policy: ChunkPolicy) -> Duration {
        let nominal = match policy {
            ChunkPolicy::Fixed(d) => d,
            ChunkPolicy::Rows(rows) => {
                Duration::milliseconds(self.interval.as_millis() * rows as i64)
            }
            ChunkPolicy::MaxRows => self.max_chunk(),
        };

        if nominal <= Duration::zero() {
            self.max_chunk()
        } else {
            nominal.min(self.max_chunk())
        }
    }

    /// `[start, end)`를 윈도우들로 분할.
    ///
    /// `start >= end`이면 빈 목록을 반환합니다.
    pub fn plan(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        policy: ChunkPolicy,
        direction: PlanDirection,
    ) -> Vec<TimeWindow> {
        if start >= end {
            return Vec::new();
        }

        let chunk = self.chunk_size(policy);
        let mut windows = Vec::new();

        match direction {
            PlanDirection::Forward => {
                let mut cursor = start;
                while cursor < end {
                    let next = cursor.checked_add_signed(chunk).map_or(end, |t| t.min(end));
                    windows.push(TimeWindow::new(cursor, next));
                    cursor = next;
                }
            }
            PlanDirection::Backward => {
                let mut cursor = end;
                while cursor > start {
                    let prev = cursor.checked_sub_signed(chunk).map_or(start, |t| t.max(start));
                    windows.push(TimeWindow::new(prev, cursor));
                    cursor = prev;
                }
            }
        }

        windows
    }
}
