//! 네이버 금융 외국인/기관 매매동향 페이지 요청.
//!
//! ## 데이터 소스
//! - `/item/frgn.naver?code={종목코드}&page={페이지}`: 일별 종가, 기관/외국인 순매매량
//!
//! ## 사용 예시
//! ```rust,ignore
//! let fetcher = NaverInvestorFetcher::new()?;
//! match fetcher.fetch_page("005930", 1).await? {
//!     PageFetch::Markup(html) => { /* frgn_table::extract_rows */ }
//!     PageFetch::NoData { status } => println!("데이터 없음: {}", status),
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};

/// 네이버 금융 기본 주소.
pub const NAVER_FINANCE_BASE_URL: &str = "https://finance.naver.com";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 페이지 요청 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFetch {
    /// 2xx 응답 본문
    Markup(String),
    /// 2xx가 아닌 응답. 해당 종목의 페이지 순회를 끝냅니다.
    NoData { status: u16 },
}

/// 종목별 페이지 공급자.
///
/// 수집기는 이 트레이트에만 의존하므로 테스트에서 가짜 공급자로 바꿀 수 있습니다.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// 한 종목의 `page`번째 페이지를 요청합니다 (1부터 시작).
    ///
    /// 네트워크 오류/타임아웃은 `Err`(일시적 오류)로 반환됩니다.
    async fn fetch_page(&self, stock_code: &str, page: u32) -> Result<PageFetch>;
}

/// 네이버 금융 매매동향 페이지 요청기.
#[derive(Debug, Clone)]
pub struct NaverInvestorFetcher {
    client: Client,
    base_url: String,
}

impl NaverInvestorFetcher {
    /// 기본 설정 (10초 타임아웃)으로 생성합니다.
    pub fn new() -> Result<Self> {
        Self::with_base_url(NAVER_FINANCE_BASE_URL, Duration::from_secs(10))
    }

    /// 기본 주소와 타임아웃을 지정해 생성합니다.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self) -> String {
        format!("{}/item/frgn.naver", self.base_url)
    }
}

#[async_trait]
impl PageSource for NaverInvestorFetcher {
    async fn fetch_page(&self, stock_code: &str, page: u32) -> Result<PageFetch> {
        let page_param = page.to_string();
        let response = self
            .client
            .get(self.page_url())
            .query(&[("code", stock_code), ("page", page_param.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(stock_code, page, status = status.as_u16(), "페이지 응답 없음");
            return Ok(PageFetch::NoData {
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        Ok(PageFetch::Markup(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn page_query(code: &str, page: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("code".into(), code.into()),
            Matcher::UrlEncoded("page".into(), page.into()),
        ])
    }

    #[tokio::test]
    async fn test_fetch_page_returns_markup() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/item/frgn.naver")
            .match_query(page_query("005930", "2"))
            .match_header("user-agent", Matcher::Regex("Mozilla".into()))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><table></table></html>")
            .create_async()
            .await;

        let fetcher =
            NaverInvestorFetcher::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let result = fetcher.fetch_page("005930", 2).await.unwrap();

        assert_eq!(
            result,
            PageFetch::Markup("<html><table></table></html>".to_string())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/item/frgn.naver")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let fetcher =
            NaverInvestorFetcher::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let result = fetcher.fetch_page("999999", 1).await.unwrap();

        assert_eq!(result, PageFetch::NoData { status: 404 });
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        // 열려 있지 않은 포트
        let fetcher =
            NaverInvestorFetcher::with_base_url("http://127.0.0.1:1", Duration::from_secs(2))
                .unwrap();
        let err = fetcher.fetch_page("005930", 1).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    #[ignore] // 실제 네트워크 테스트는 ignore
    async fn test_fetch_samsung_first_page() {
        let fetcher = NaverInvestorFetcher::new().unwrap();
        match fetcher.fetch_page("005930", 1).await {
            Ok(PageFetch::Markup(html)) => assert!(html.contains("table")),
            Ok(other) => eprintln!("응답 없음: {:?}", other),
            Err(e) => eprintln!("오류: {}", e),
        }
    }
}
