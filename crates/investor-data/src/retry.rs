//! 일시적 오류에 대한 재시도 유틸리티.
//!
//! 페이지 요청과 DB 커밋이 같은 정책 타입을 공유하고, 사용처마다 설정값만 다르게 줍니다.
//!
//! ```rust,ignore
//! use investor_data::retry::{with_retry_recover, RetryConfig};
//!
//! let inserted = with_retry_recover(
//!     &RetryConfig::commit(),
//!     |_attempt| store.insert_flows(code, name, &records),
//!     |_err| store.reset_session(),
//! )
//! .await?;
//! ```

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::DataError;

/// 재시도 가능 여부를 판정할 수 있는 오류.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for DataError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함).
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간.
    pub base_delay: Duration,
    /// 대기 시간 상한.
    pub max_delay: Duration,
    /// 백오프 배수.
    pub backoff_multiplier: f64,
    /// ±25% 지터 추가 여부.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// DB 커밋용: 3회 시도, 1초 → 2초 백오프.
    pub fn commit() -> Self {
        Self::default()
    }

    /// 페이지 요청용: 짧은 지연, 적은 시도.
    pub fn page_fetch() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// 재시도 없음.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `retry_index`번째 재시도 전 대기 시간 (0부터 시작).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(retry_index as i32);
        let delay = Duration::from_secs_f64(self.base_delay.as_secs_f64() * multiplier)
            .min(self.max_delay);

        if self.add_jitter {
            let jitter_range = delay.as_millis() as f64 * 0.25;
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
            Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
        } else {
            delay
        }
    }
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// `operation`에는 현재 시도 번호(1부터)가 전달됩니다.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_recover(config, operation, |_| async {}).await
}

/// 재시도 전에 복구 작업(`recover`)을 실행하는 재시도.
///
/// 일시적 오류가 나면 `recover`를 호출한 뒤 백오프만큼 대기하고 다시 시도합니다.
/// 재시도 불가 오류는 즉시 반환하고, 시도 횟수를 모두 쓰면 마지막 오류를 반환합니다.
pub async fn with_retry_recover<T, E, F, Fut, R, RFut>(
    config: &RetryConfig,
    mut operation: F,
    mut recover: R,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(&E) -> RFut,
    RFut: Future<Output = ()>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!(error = %e, "재시도 불가능한 에러, 즉시 실패 반환");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(error = %e, attempts = attempt, "최대 시도 횟수 도달, 실패 반환");
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for(attempt - 1);
                warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "일시적 에러, 복구 후 재시도 예정"
                );
                recover(&e).await;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
