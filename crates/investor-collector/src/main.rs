//! 투자자 매매동향 수집 CLI.

use clap::{Parser, Subcommand};
use investor_collector::modules::{
    initialize_stock_list, purge_records, Accumulator, BatchOrchestrator, RunOptions,
};
use investor_collector::{CollectorConfig, RunStatusHandle};
use investor_core::validation::{validate_collect_years, validate_max_pages};
use investor_core::{init_logging, DatabaseConfig, LogConfig, PurgeScope};
use investor_data::{Database, DbSession, NaverInvestorFetcher, PgTradingStore, TradingStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "investor-collector")]
#[command(about = "Naver Finance 외국인/기관 순매매 수집기", long_about = None)]
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
    /// 전체 종목 매매동향 수집
    Collect {
        /// 수집 기간 (년, 1~10)
        #[arg(long)]
        years: Option<u32>,

        /// 종목당 최대 페이지 수 (1~1000)
        #[arg(long)]
        max_pages: Option<u32>,

        /// 마지막 체크포인트 이후부터 이어서 수집
        #[arg(long)]
        resume: bool,
    },

    /// 누적 순매수 재계산
    Accumulate {
        /// 특정 종목만 재계산 (없으면 전체)
        #[arg(long)]
        stock_code: Option<String>,
    },

    /// 매매 기록 삭제
    Clear {
        /// 전체 삭제
        #[arg(long, conflicts_with_all = ["stock_code", "codes"])]
        all: bool,

        /// 한 종목 삭제
        #[arg(long, conflicts_with = "codes")]
        stock_code: Option<String>,

        /// 여러 종목 삭제 (쉼표로 구분, 예: "005930,000660")
        #[arg(long)]
        codes: Option<String>,
    },

    /// 기본 종목 목록 등록
    InitStocks,

    /// 데이터베이스 마이그레이션
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(LogConfig::new(&cli.log_level).with_env_format())?;
    tracing::info!("Investor Collector 시작");

    let config = CollectorConfig::from_env()?;
    let session = DbSession::connect(DatabaseConfig {
        url: config.database_url.clone(),
        ..Default::default()
    })
    .await?;
    tracing::info!("데이터베이스 연결 성공");

    let store = Arc::new(PgTradingStore::new(session.clone()));

    match cli.command {
        Commands::Collect {
            years,
            max_pages,
            resume,
        } => {
            let defaults = RunOptions::from_config(&config.collect);
            let options = RunOptions {
                years: years.unwrap_or(defaults.years),
                max_pages: max_pages.unwrap_or(defaults.max_pages),
                resume: resume || defaults.resume,
            };
            validate_collect_years(options.years)?;
            validate_max_pages(options.max_pages)?;

            let fetcher = NaverInvestorFetcher::with_base_url(
                investor_data::provider::NAVER_FINANCE_BASE_URL,
                config.collect.request_timeout(),
            )?;
            let status = RunStatusHandle::new(config.collect.failure_list_limit);
            status
                .begin(&Uuid::new_v4().to_string(), options.years, options.max_pages)
                .await?;

            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("종료 신호 수신, 현재 종목 처리 후 중단합니다");
                    signal_token.cancel();
                }
            });

            let orchestrator = BatchOrchestrator::new(
                Arc::new(fetcher),
                store.clone(),
                status.clone(),
                config.collect.clone(),
            );
            orchestrator.run(options, cancel).await?;

            let run = status.snapshot().await;
            for failure in &run.failed_stocks {
                tracing::warn!(failure = %failure, "실패 종목");
            }
        }
        Commands::Accumulate { stock_code } => {
            let accumulator = Accumulator::new(store.clone(), config.collect.seed_from_baseline);
            match stock_code {
                Some(code) => {
                    investor_core::validation::validate_stock_code(&code)?;
                    let report = accumulator.recompute(&code).await?;
                    tracing::info!(
                        stock_code = %report.stock_code,
                        records = report.records,
                        institution_accum = report.institution_accum,
                        foreigner_accum = report.foreigner_accum,
                        "누적 재계산 완료"
                    );
                }
                None => {
                    let (_, stats) = accumulator.recompute_all().await?;
                    stats.log_summary("누적 순매수 재계산");
                }
            }
        }
        Commands::Clear {
            all,
            stock_code,
            codes,
        } => {
            let scope = match (all, stock_code, codes) {
                (true, _, _) => PurgeScope::All,
                (false, Some(stock_code), _) => PurgeScope::Stock { stock_code },
                (false, None, Some(codes)) => PurgeScope::Codes {
                    stock_codes: codes
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                },
                (false, None, None) => {
                    return Err("--all, --stock-code, --codes 중 하나를 지정해야 합니다".into());
                }
            };
            let report = purge_records(store.as_ref(), &scope).await?;
            tracing::info!(scope = %report.scope, deleted = report.deleted, "삭제 완료");
        }
        Commands::InitStocks => {
            let inserted = initialize_stock_list(store.as_ref()).await?;
            let total = store.list_instruments().await?.len();
            tracing::info!(inserted, total, "종목 목록 초기화 완료");
        }
        Commands::Migrate => {
            Database::from_pool(session.pool().await).migrate().await?;
            tracing::info!("마이그레이션 완료");
        }
    }

    session.pool().await.close().await;
    tracing::info!("Investor Collector 종료");

    Ok(())
}
