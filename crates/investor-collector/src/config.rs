//! 환경변수 기반 설정 모듈.

use investor_data::RetryConfig;
use std::time::Duration;

use crate::Result;

/// CLI 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 수집 설정
    pub collect: CollectConfig,
}

/// 수집 실행 설정
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// 기본 수집 기간 (년)
    pub default_years: u32,
    /// 종목당 최대 페이지 수 기본값
    pub default_max_pages: u32,
    /// 배치당 종목 수
    pub batch_size: usize,
    /// 같은 종목의 페이지 요청 간 딜레이 (밀리초)
    pub page_delay_ms: u64,
    /// 종목 간 딜레이 (밀리초)
    pub instrument_delay_ms: u64,
    /// 배치 간 딜레이 (초)
    pub batch_delay_secs: u64,
    /// N개 종목마다 메모리 사용량 확인
    pub memory_check_every: usize,
    /// 정리 작업을 수행할 메모리 사용률 (%)
    pub memory_limit_pct: f64,
    /// N개 종목마다 DB 세션 재생성
    pub session_recycle_every: usize,
    /// 실패 종목 목록 최대 길이
    pub failure_list_limit: usize,
    /// 페이지 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 페이지 요청 최대 시도 횟수
    pub page_fetch_attempts: u32,
    /// DB 커밋 최대 시도 횟수
    pub commit_attempts: u32,
    /// DB 커밋 재시도 기본 대기 (밀리초)
    pub commit_retry_base_ms: u64,
    /// 수집 시작 전 기본 종목 목록 등록
    pub bootstrap_defaults: bool,
    /// 마지막 체크포인트 이후부터 이어서 수집
    pub resume: bool,
    /// 누적 계산 시 종목 기준값에서 시작 (기본: 0에서 시작)
    pub seed_from_baseline: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            default_years: 3,
            default_max_pages: 100,
            batch_size: 50,
            page_delay_ms: 500,
            instrument_delay_ms: 500,
            batch_delay_secs: 30,
            memory_check_every: 10,
            memory_limit_pct: 80.0,
            session_recycle_every: 100,
            failure_list_limit: 100,
            request_timeout_secs: 10,
            page_fetch_attempts: 2,
            commit_attempts: 3,
            commit_retry_base_ms: 1000,
            bootstrap_defaults: true,
            resume: false,
            seed_from_baseline: false,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        Ok(Self {
            database_url,
            collect: CollectConfig::from_env(),
        })
    }
}

impl CollectConfig {
    /// `COLLECT_*` 환경변수에서 로드합니다. 값이 없거나 잘못되면 기본값을 씁니다.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            default_years: env_var_parse("COLLECT_YEARS", d.default_years),
            default_max_pages: env_var_parse("COLLECT_MAX_PAGES", d.default_max_pages),
            batch_size: env_var_parse("COLLECT_BATCH_SIZE", d.batch_size).max(1),
            page_delay_ms: env_var_parse("COLLECT_PAGE_DELAY_MS", d.page_delay_ms),
            instrument_delay_ms: env_var_parse(
                "COLLECT_INSTRUMENT_DELAY_MS",
                d.instrument_delay_ms,
            ),
            batch_delay_secs: env_var_parse("COLLECT_BATCH_DELAY_SECS", d.batch_delay_secs),
            memory_check_every: env_var_parse("COLLECT_MEMORY_CHECK_EVERY", d.memory_check_every),
            memory_limit_pct: env_var_parse("COLLECT_MEMORY_LIMIT_PCT", d.memory_limit_pct),
            session_recycle_every: env_var_parse(
                "COLLECT_SESSION_RECYCLE_EVERY",
                d.session_recycle_every,
            ),
            failure_list_limit: env_var_parse("COLLECT_FAILURE_LIST_LIMIT", d.failure_list_limit),
            request_timeout_secs: env_var_parse(
                "COLLECT_REQUEST_TIMEOUT_SECS",
                d.request_timeout_secs,
            ),
            page_fetch_attempts: env_var_parse("COLLECT_PAGE_FETCH_ATTEMPTS", d.page_fetch_attempts),
            commit_attempts: env_var_parse("COLLECT_COMMIT_ATTEMPTS", d.commit_attempts),
            commit_retry_base_ms: env_var_parse(
                "COLLECT_COMMIT_RETRY_BASE_MS",
                d.commit_retry_base_ms,
            ),
            bootstrap_defaults: env_var_bool("COLLECT_BOOTSTRAP_DEFAULTS", d.bootstrap_defaults),
            resume: env_var_bool("COLLECT_RESUME", d.resume),
            seed_from_baseline: env_var_bool("ACCUM_SEED_FROM_BASELINE", d.seed_from_baseline),
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn instrument_delay(&self) -> Duration {
        Duration::from_millis(self.instrument_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 페이지 요청 재시도 정책
    pub fn page_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.page_fetch_attempts,
            ..RetryConfig::page_fetch()
        }
    }

    /// DB 커밋 재시도 정책
    pub fn commit_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.commit_attempts,
            base_delay: Duration::from_millis(self.commit_retry_base_ms),
            ..RetryConfig::commit()
        }
    }

    /// 딜레이 없는 테스트용 설정
    pub fn without_delays() -> Self {
        Self {
            page_delay_ms: 0,
            instrument_delay_ms: 0,
            batch_delay_secs: 0,
            commit_retry_base_ms: 0,
            ..Self::default()
        }
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
