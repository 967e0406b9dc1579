//! 과거 캔들스틱 수집 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use candle_collector::config::locate_config;
use candle_collector::pipeline::{FetchRetryExecutor, RateLimiter, WorkerPool};
use candle_collector::quote::{HttpQuoteClient, QuoteProvider};
use candle_collector::storage::{CandleStore, MemoryCandleStore, PgCandleStore};
use candle_collector::{CollectorConfig, CollectorError};
use candle_core::{build_task_set, init_logging, LogFormat};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "candle-collector")]
#[command(about = "Historical candlestick collector (symbols × dates → PostgreSQL)", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로 (기본: $CONFIG_DIR 또는 ./config/collector.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// DB에 연결하지 않고 메모리 저장소로 실행
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드 (.env → 경로 결정 → 파일 + 환경변수)
    let config_path = locate_config(cli.config.as_deref());
    let config = CollectorConfig::load(&config_path)
        .with_context(|| format!("설정 로드 실패: {}", config_path.display()))?;

    // 로깅 초기화
    let mut log_config = config.logging.clone();
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(&log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!(
        config = %config_path.display(),
        symbols = config.symbols.len(),
        dates = config.dates.len(),
        total_tasks = config.total_tasks(),
        period = %config.period,
        adjust_type = %config.adjust_type,
        workers = config.quote.threads,
        rps = config.quote.rps,
        "Candle Collector 시작"
    );

    let provider: Arc<dyn QuoteProvider> =
        Arc::new(HttpQuoteClient::new(&config.quote).context("시세 클라이언트 생성 실패")?);

    // 저장소 준비
    let mut pg_pool = None;
    let mut memory_store = None;
    let store: Arc<dyn CandleStore> = if cli.dry_run {
        tracing::warn!("dry-run: 메모리 저장소 사용");
        let memory = Arc::new(MemoryCandleStore::new());
        memory_store = Some(memory.clone());
        memory
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(config.database.connect_options()?)
            .await
            .context("데이터베이스 연결 실패")?;
        tracing::info!(database = %config.database.name, "데이터베이스 연결 성공");
        pg_pool = Some(pool.clone());
        Arc::new(PgCandleStore::new(pool))
    };

    let limiter = Arc::new(RateLimiter::per_second(config.quote.rps));
    let executor = FetchRetryExecutor::new(
        provider,
        limiter,
        config.retry.into(),
        config.period,
        config.adjust_type,
    );

    // 인증 실패는 작업 시작 전에 중단
    if let Some(symbol) = config.symbols.first() {
        executor
            .verify_access(symbol)
            .await
            .map_err(CollectorError::from)
            .context("시세 서비스 인증 실패")?;
    }

    // Ctrl-C: 새 작업을 받지 않고 진행 중인 재시도 대기를 중단
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("종료 신호 수신, 남은 작업 취소 중...");
                cancel.cancel();
            }
        });
    }

    let pool = WorkerPool::new(executor, store, config.quote.threads).with_cancellation(cancel);
    let jobs = build_task_set(&config.symbols, &config.dates);
    let stats = pool.run(jobs).await;

    stats.log_summary("캔들 수집");
    if let Some(memory) = memory_store {
        tracing::info!(
            tables = memory.table_names().len(),
            rows = memory.total_rows(),
            "dry-run 결과"
        );
    }
    println!("{}", stats.summary_line());

    if let Some(pool) = pg_pool {
        pool.close().await;
    }

    if stats.aborted {
        anyhow::bail!("시세 서비스 인증 실패로 수집이 중단되었습니다");
    }
    tracing::info!("Candle Collector 종료");

    Ok(())
}
