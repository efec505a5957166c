//! 투자자 매매동향 API 서버.
//!
//! 수집 제어, 종목/매매 기록 관리, 변경 이력 조회 엔드포인트를 제공합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use investor_api::routes::create_api_router;
use investor_api::state::AppState;
use investor_collector::{CollectConfig, CollectorService};
use investor_core::{init_logging, AppConfig, LogConfig};
use investor_data::provider::NAVER_FINANCE_BASE_URL;
use investor_data::{Database, DbSession, NaverInvestorFetcher, PgTradingStore};

/// CORS 설정.
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록. 없으면 모든 origin 허용.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

fn create_app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = AppConfig::load_default().context("설정 로드 실패")?;
    init_logging(LogConfig::from_settings(&settings.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Investor API 서버 시작");

    let session = DbSession::connect(settings.database.clone())
        .await
        .context("데이터베이스 연결 실패")?;
    info!("데이터베이스 연결 성공");

    if let Err(e) = Database::from_pool(session.pool().await).migrate().await {
        error!(error = %e, "마이그레이션 실패");
    }

    let collect = CollectConfig::from_env();
    let fetcher =
        NaverInvestorFetcher::with_base_url(NAVER_FINANCE_BASE_URL, collect.request_timeout())
            .context("HTTP 클라이언트 생성 실패")?;
    let store = PgTradingStore::new(session.clone());
    let collector = CollectorService::new(Arc::new(fetcher), Arc::new(store), collect);

    let state = Arc::new(AppState::new(collector).with_db(session.clone()));
    let app = create_app(
        state.clone(),
        Duration::from_secs(settings.server.request_timeout_secs),
    );

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("{} 바인딩 실패", addr))?;
    info!(addr = %addr, "HTTP 서버 대기 중");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 진행 중인 수집은 현재 종목까지 처리한 뒤 멈춥니다.
    if state.collector.status().await.is_running {
        if let Err(e) = state.collector.stop().await {
            warn!(error = %e, "수집 중단 요청 실패");
        }
    }
    state.collector.wait().await;

    session.pool().await.close().await;
    info!("Investor API 서버 종료");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
