//! End-to-end collection against a mocked frgn.naver endpoint.

use chrono::{Duration as ChronoDuration, NaiveDate};
use investor_collector::modules::{today_kst, Accumulator, BatchOrchestrator, RunOptions};
use investor_collector::{CollectConfig, RunStatusHandle};
use investor_core::{CollectionPhase, InstrumentRef};
use investor_data::{MemoryTradingStore, NaverInvestorFetcher};
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 실제 페이지처럼 레이아웃 표 안에 데이터 표가 들어 있는 마크업.
fn frgn_page(rows: &[(NaiveDate, &str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(date, close, inst, frgn)| {
            format!(
                r#"<tr onmouseover="mouseOver(this)">
                    <td class="tc"><span class="tah p10 gray03">{}</span></td>
                    <td class="num"><span class="tah p11">{}</span></td>
                    <td class="num"><span class="tah p11 red02">▲ 500</span></td>
                    <td class="num"><span class="tah p11 red02">+0.72%</span></td>
                    <td class="num"><span class="tah p11">12,345,678</span></td>
                    <td class="num"><span class="tah p11 red01">{}</span></td>
                    <td class="num"><span class="tah p11 nv01">{}</span></td>
                    <td class="num"><span class="tah p11">3,012,345,678</span></td>
                    <td class="num"><span class="tah p11">52.13%</span></td>
                </tr>
                <tr><td colspan="9" class="blank_09"></td></tr>"#,
                date.format("%Y.%m.%d"),
                close,
                inst,
                frgn
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <table class="tb_type1"><tr><td>
            <table summary="외국인 기관 순매매 거래량에 관한표이며 날짜별로 정보를 제공합니다." class="type2">
                <tr><th>날짜</th><th>종가</th><th>전일비</th><th>등락률</th><th>거래량</th>
                    <th>기관 순매매량</th><th>외국인 순매매량</th><th>보유주수</th><th>보유율</th></tr>
                <tr><td colspan="9" class="blank_09"></td></tr>
                {}
            </table>
        </td></tr></table>
        </body></html>"#,
        body
    )
}

fn page_query(code: &str, page: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("code".into(), code.into()),
        Matcher::UrlEncoded("page".into(), page.into()),
    ])
}

struct Fixture {
    server: ServerGuard,
    store: Arc<MemoryTradingStore>,
}

impl Fixture {
    async fn new() -> Self {
        let store = Arc::new(MemoryTradingStore::with_instruments(vec![
            InstrumentRef::new("005930", "삼성전자"),
            InstrumentRef::new("000660", "SK하이닉스"),
        ]));
        Self {
            server: Server::new_async().await,
            store,
        }
    }

    async fn run(&self) -> (investor_collector::CollectionStats, RunStatusHandle) {
        let fetcher =
            NaverInvestorFetcher::with_base_url(self.server.url(), Duration::from_secs(5)).unwrap();
        let config = CollectConfig {
            bootstrap_defaults: false,
            ..CollectConfig::without_delays()
        };
        let status = RunStatusHandle::new(config.failure_list_limit);
        status.begin("pipeline", 1, 10).await.unwrap();

        let orchestrator = BatchOrchestrator::new(
            Arc::new(fetcher),
            self.store.clone(),
            status.clone(),
            config,
        );
        let stats = orchestrator
            .run(
                RunOptions {
                    years: 1,
                    max_pages: 10,
                    resume: false,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        (stats, status)
    }
}

#[tokio::test]
async fn test_collect_persist_and_accumulate() {
    let mut fixture = Fixture::new().await;
    let today = today_kst();
    let day = |n: i64| today - ChronoDuration::days(n);

    let page1 = fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(page_query("005930", "1"))
        .with_status(200)
        .with_body(frgn_page(&[
            (day(1), "70,000", "+200", "-1,000"),
            (day(2), "69,500", "-50", "+2,500"),
        ]))
        .expect(2)
        .create_async()
        .await;
    // 두 번째 페이지 중간에 기간 경계를 넘습니다.
    let page2 = fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(page_query("005930", "2"))
        .with_status(200)
        .with_body(frgn_page(&[
            (day(3), "69,000", "+100", "0"),
            (day(800), "50,000", "+999", "+999"),
        ]))
        .expect(2)
        .create_async()
        .await;
    let page3 = fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(page_query("005930", "3"))
        .with_status(200)
        .with_body(frgn_page(&[(day(900), "1", "1", "1")]))
        .expect(0)
        .create_async()
        .await;
    fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(Matcher::UrlEncoded("code".into(), "000660".into()))
        .with_status(404)
        .create_async()
        .await;

    let (stats, status) = fixture.run().await;

    assert_eq!(stats.total, 2);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.no_data, 1);
    assert_eq!(stats.new_records, 3);

    let records = fixture.store.records("005930");
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].trade_date, day(1));
    assert_eq!(records[2].close_price, Some(70_000));
    assert_eq!(records[2].institution_net_buy, Some(200));
    assert_eq!(records[2].foreigner_net_buy, Some(-1_000));
    assert!(fixture.store.records("000660").is_empty());

    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.current_phase, CollectionPhase::Completed);
    assert_eq!(snapshot.no_data_count, 1);

    // 같은 페이지를 다시 수집해도 새로 저장되는 행은 없습니다.
    let (again, _) = fixture.run().await;
    assert_eq!(again.new_records, 0);
    assert_eq!(again.duplicate_records, 3);
    assert_eq!(fixture.store.record_count(), 3);

    page1.assert_async().await;
    page2.assert_async().await;
    page3.assert_async().await;

    let report = Accumulator::new(fixture.store.clone(), false)
        .recompute("005930")
        .await
        .unwrap();
    assert_eq!(report.records, 3);

    // 오름차순: day(3), day(2), day(1)
    let records = fixture.store.records("005930");
    let inst: Vec<_> = records.iter().map(|r| r.institution_accum).collect();
    let frgn: Vec<_> = records.iter().map(|r| r.foreigner_accum).collect();
    assert_eq!(inst, vec![100, 50, 250]);
    assert_eq!(frgn, vec![0, 2_500, 1_500]);
}

#[tokio::test]
async fn test_transient_commit_failure_recovers() {
    let mut fixture = Fixture::new().await;
    let today = today_kst();

    fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(page_query("005930", "1"))
        .with_status(200)
        .with_body(frgn_page(&[(today - ChronoDuration::days(1), "70,000", "+1", "+1")]))
        .create_async()
        .await;
    fixture
        .server
        .mock("GET", "/item/frgn.naver")
        .match_query(page_query("005930", "2"))
        .with_status(200)
        .with_body(frgn_page(&[]))
        .create_async()
        .await;

    fixture.store.fail_next_inserts(2, true);
    let (stats, _) = fixture.run().await;

    assert_eq!(stats.failed, 0);
    assert_eq!(stats.new_records, 1);
    assert_eq!(fixture.store.insert_attempts(), 3);
    assert_eq!(fixture.store.session_resets(), 2);
}
