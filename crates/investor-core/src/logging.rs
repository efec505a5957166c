//! tracing 기반 로깅 초기화.
//!
//! 출력 형식은 세 가지를 지원합니다:
//! - **pretty**: 개발 중 터미널 출력
//! - **json**: 운영 환경 로그 수집
//! - **compact**: 한 줄 요약

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("알 수 없는 로그 형식: {}", other)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 기본 필터 (`RUST_LOG`가 없을 때 사용, 예: "investor_collector=debug,info")
    pub level: String,
    pub format: LogFormat,
    /// span 진입/종료 이벤트 출력
    pub with_span_events: bool,
    /// 파일명과 줄 번호 출력
    pub with_file: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// `LOG_FORMAT` 환경 변수로 형식을 덮어씁니다.
    pub fn with_env_format(mut self) -> Self {
        if let Some(format) = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.format = format;
        }
        self
    }

    /// `AppConfig`의 로깅 섹션으로부터 생성합니다.
    pub fn from_settings(settings: &crate::config::LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            format: settings.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// 전역 subscriber를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 그 값이 `config.level`보다 우선합니다.
///
/// ```no_run
/// use investor_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("investor_collector=debug,info").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "로깅 초기화 완료");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_settings_falls_back_to_pretty() {
        let settings = crate::config::LoggingConfig {
            level: "debug".to_string(),
            format: "unknown".to_string(),
        };
        let config = LogConfig::from_settings(&settings);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
