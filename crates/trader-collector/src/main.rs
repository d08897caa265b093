//! Historical candle backfill CLI.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use trader_collector::config::parse_symbol_list;
use trader_collector::modules::{CheckpointStore, PgCheckpointStore};
use trader_collector::{BackfillRunner, CollectorConfig};
use trader_core::{init_logging, ChunkPolicy, LogConfig, PlanDirection};
use trader_data::{Database, DatabaseConfig, PgInstrumentRegistry, PriceHistoryStore};
use trader_exchange::{BinanceKlineClient, RetryController};

#[derive(Parser)]
#[command(name = "trader-collector")]
#[command(about = "Time-windowed historical candle backfill", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 과거 캔들 백필
    Backfill {
        /// 시작 날짜 (YYYY-MM-DD, 포함)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// 종료 날짜 (YYYY-MM-DD, 제외)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// 윈도우 크기 (예: "6h", "1d", "rows:1440", "max")
        #[arg(long)]
        chunk: Option<ChunkPolicy>,

        /// 순회 방향 (forward, backward)
        #[arg(long)]
        direction: Option<PlanDirection>,

        /// 특정 심볼만 수집 (쉼표로 구분, 예: "BTC,ETH")
        #[arg(long)]
        symbols: Option<String>,

        /// 체크포인트에서 재개
        #[arg(long)]
        resume: bool,

        /// 비활성 종목도 포함
        #[arg(long)]
        include_disabled: bool,
    },

    /// 체크포인트 목록
    Checkpoints,

    /// 체크포인트 삭제
    ClearCheckpoint {
        /// 워크플로우 이름 (기본: BACKFILL_WORKFLOW)
        #[arg(long)]
        workflow: Option<String>,
    },

    /// 데이터베이스 마이그레이션 실행
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    init_logging(LogConfig::new(cli.log_level.as_str()).with_env_format())?;

    tracing::info!("Backfill Collector 시작");

    // 설정 로드
    let mut config = CollectorConfig::from_env()?;
    tracing::debug!(exchange = %config.backfill.exchange, "설정 로드 완료");

    // DB 연결
    let db = Database::connect(
        &DatabaseConfig::new(config.database_url.as_str())
            .with_max_connections(config.database_max_connections),
    )
    .await?;
    tracing::info!("데이터베이스 연결 성공");

    let checkpoints = PgCheckpointStore::new(db.pool().clone());

    // 명령 실행
    match cli.command {
        Commands::Backfill {
            start,
            end,
            chunk,
            direction,
            symbols,
            resume,
            include_disabled,
        } => {
            // CLI 인자가 환경변수보다 우선
            if start.is_some() {
                config.backfill.start_date = start;
            }
            if end.is_some() {
                config.backfill.end_date = end;
            }
            if let Some(chunk) = chunk {
                config.backfill.chunk = chunk;
            }
            if let Some(direction) = direction {
                config.backfill.direction = direction;
            }
            if include_disabled {
                config.backfill.include_disabled = true;
            }

            let mut options = config.backfill.options();
            options.symbols = symbols.as_deref().map(parse_symbol_list);

            let range = config.backfill.range(Utc::now().date_naive());
            let planner = config.planner();

            let runner = BackfillRunner::new(
                Arc::new(BinanceKlineClient::new(config.binance.clone())?),
                Arc::new(PriceHistoryStore::new(db.pool().clone())),
                Arc::new(PgInstrumentRegistry::new(db.pool().clone())),
                planner,
                options,
            )
            .with_retry(RetryController::new(config.backfill.retry_policy()))
            .with_checkpoints(Arc::new(checkpoints));

            let result = if resume {
                runner.resume(range).await
            } else {
                runner.run(range).await
            };

            if let Err(e) = result {
                tracing::error!(error = %e, fatal = e.is_fatal(), "백필 실패");
                db.close().await;
                return Err(e.into());
            }
        }
        Commands::Checkpoints => {
            let list = checkpoints.list().await?;
            if list.is_empty() {
                tracing::info!("저장된 체크포인트가 없습니다");
            }
            for cp in list {
                tracing::info!(
                    workflow = %cp.workflow_name,
                    range = %cp.range,
                    direction = %cp.direction,
                    last_window = ?cp.last_window.map(|w| w.to_string()),
                    windows_done = cp.windows_done,
                    status = %cp.status,
                    updated_at = ?cp.updated_at,
                    "체크포인트"
                );
            }
        }
        Commands::ClearCheckpoint { workflow } => {
            let workflow = workflow.unwrap_or_else(|| config.backfill.workflow.clone());
            checkpoints.clear(&workflow).await?;
            tracing::info!(workflow = %workflow, "체크포인트 삭제");
        }
        Commands::Migrate => {
            db.migrate().await?;
        }
    }

    db.close().await;
    tracing::info!("Backfill Collector 종료");

    Ok(())
}
