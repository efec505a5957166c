//! 매매동향 페이지의 표에서 일별 행을 추출합니다.
//!
//! 페이지 구조가 바뀌어도 버티도록 고정 셀렉터 대신 후보 표에 점수를 매겨 고릅니다.
//! - 행이 5개 이상이면 +1
//! - 앞쪽 데이터 행 5개 중 첫 칸이 날짜처럼 보이면 +2
//!
//! 날짜처럼 보이는 표가 하나도 없으면 행이 가장 많은 표를 사용합니다.
//! 형식이 맞지 않는 행은 조용히 버리고, 버린 개수만 집계합니다.

use chrono::{Datelike, NaiveDate};
use investor_core::DailyInvestorFlow;
use scraper::{ElementRef, Html, Selector};

/// 유효한 데이터 행의 최소 칸 수.
pub const MIN_CELLS: usize = 6;

const DATE_PROBE_ROWS: usize = 5;
const MIN_TABLE_ROWS: usize = 5;

/// 칸 위치.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub date: usize,
    pub close: usize,
    pub institution: usize,
    pub foreigner: usize,
}

/// 날짜, 종가, 전일비, 등락률, 거래량, 기관, 외국인, 보유주수, 보유율
pub const FRGN_LAYOUT: ColumnLayout = ColumnLayout {
    date: 0,
    close: 1,
    institution: 5,
    foreigner: 6,
};

/// 한 페이지에서 추출한 행의 지연 시퀀스.
///
/// 유한하며 다시 시작할 수 없습니다. 페이지에 나온 순서대로 반환합니다.
#[derive(Debug)]
pub struct FlowRows {
    rows: std::vec::IntoIter<Vec<String>>,
    layout: ColumnLayout,
    today: NaiveDate,
    discarded: usize,
    table_found: bool,
}

impl FlowRows {
    fn empty(today: NaiveDate) -> Self {
        Self {
            rows: Vec::new().into_iter(),
            layout: FRGN_LAYOUT,
            today,
            discarded: 0,
            table_found: false,
        }
    }

    /// 지금까지 버린 행 수.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// 후보 표를 찾았는지 여부.
    pub fn table_found(&self) -> bool {
        self.table_found
    }
}

impl Iterator for FlowRows {
    type Item = DailyInvestorFlow;

    fn next(&mut self) -> Option<Self::Item> {
        for cells in self.rows.by_ref() {
            match parse_row(&cells, self.layout, self.today) {
                Some(flow) => return Some(flow),
                None => self.discarded += 1,
            }
        }
        None
    }
}

/// 마크업에서 데이터 표를 골라 행 시퀀스를 만듭니다.
///
/// `today`는 연도가 생략된 날짜(`MM.DD`)를 해석할 때 씁니다.
pub fn extract_rows(markup: &str, today: NaiveDate) -> FlowRows {
    let document = Html::parse_document(markup);
    let tables = collect_tables(&document);

    match select_data_table(tables) {
        Some(rows) => FlowRows {
            rows: rows.into_iter(),
            layout: FRGN_LAYOUT,
            today,
            discarded: 0,
            table_found: true,
        },
        None => FlowRows::empty(today),
    }
}

/// 모든 `<table>`의 직계 행을 칸 텍스트 목록으로 수집합니다.
///
/// 중첩 표의 행은 바깥 표에 포함하지 않습니다.
fn collect_tables(document: &Html) -> Vec<Vec<Vec<String>>> {
    let (Ok(table_sel), Ok(tr_sel)) = (Selector::parse("table"), Selector::parse("tr")) else {
        return Vec::new();
    };

    document
        .select(&table_sel)
        .map(|table| {
            table
                .select(&tr_sel)
                .filter(|tr| is_direct_row(tr, &table))
                .map(|tr| row_cells(&tr))
                .collect()
        })
        .collect()
}

fn is_direct_row(tr: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    tr.ancestors()
        .find(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| el.name() == "table")
        })
        .is_some_and(|node| node.id() == table.id())
}

/// 행의 직계 `<td>` 텍스트. 공백은 하나로 합칩니다.
fn row_cells(tr: &ElementRef<'_>) -> Vec<String> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .map(|td| {
            td.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn score_table(rows: &[Vec<String>]) -> u8 {
    let mut score = 0;
    if rows.len() >= MIN_TABLE_ROWS {
        score += 1;
    }
    if has_date_column(rows) {
        score += 2;
    }
    score
}

fn has_date_column(rows: &[Vec<String>]) -> bool {
    rows.iter()
        .filter(|cells| !cells.is_empty())
        .take(DATE_PROBE_ROWS)
        .any(|cells| looks_like_date(&cells[0]))
}

fn select_data_table(tables: Vec<Vec<Vec<String>>>) -> Option<Vec<Vec<String>>> {
    let any_dated = tables.iter().any(|rows| has_date_column(rows));

    tables
        .into_iter()
        .filter(|rows| !rows.is_empty())
        .max_by_key(|rows| {
            let score = if any_dated { score_table(rows) } else { 0 };
            (score, rows.len())
        })
}

fn looks_like_date(text: &str) -> bool {
    // 윤년 기준일이면 02.29도 날짜로 인정됩니다.
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .is_some_and(|reference| parse_trade_date(text, reference).is_some())
}

/// 한 행을 파싱합니다. 형식이 맞지 않으면 `None`.
pub fn parse_row(
    cells: &[String],
    layout: ColumnLayout,
    today: NaiveDate,
) -> Option<DailyInvestorFlow> {
    if cells.len() < MIN_CELLS {
        return None;
    }

    let trade_date = parse_trade_date(cells.get(layout.date)?, today)?;
    let close_price = optional_cell(cells, layout.close)?;
    if close_price.is_some_and(|p| p < 0) {
        return None;
    }

    Some(DailyInvestorFlow {
        trade_date,
        close_price,
        institution_net_buy: optional_cell(cells, layout.institution)?,
        foreigner_net_buy: optional_cell(cells, layout.foreigner)?,
    })
}

/// 칸이 없으면 `Some(None)`, 칸이 있는데 정수가 아니면 `None`.
fn optional_cell(cells: &[String], index: usize) -> Option<Option<i64>> {
    match cells.get(index) {
        None => Some(None),
        Some(text) => parse_signed_int(text).map(Some),
    }
}

/// 거래일 파싱.
///
/// `YYYY.MM.DD`, `YYYY-MM-DD`, `YYYY/MM/DD`와 연도가 생략된 `MM.DD`(올해)를 지원합니다.
pub fn parse_trade_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<&str> = text
        .trim()
        .split(['.', '-', '/'])
        .filter(|p| !p.is_empty())
        .collect();

    if parts.iter().any(|p| !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    match parts.as_slice() {
        [y, m, d] if y.len() == 4 && m.len() <= 2 && d.len() <= 2 => {
            NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
        }
        [m, d] if m.len() <= 2 && d.len() <= 2 => {
            NaiveDate::from_ymd_opt(today.year(), m.parse().ok()?, d.parse().ok()?)
        }
        _ => None,
    }
}

/// 부호 있는 정수 파싱.
///
/// 천 단위 구분자, `+`, `▲`, 공백을 제거합니다. `▼`는 음수로 봅니다.
/// 빈 칸과 `-` 하나는 0입니다.
pub fn parse_signed_int(text: &str) -> Option<i64> {
    let mut negative = false;
    let mut digits = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            ',' | '+' | '▲' | '↑' => {}
            '▼' | '↓' => negative = true,
            c if c.is_whitespace() => {}
            c => digits.push(c),
        }
    }

    if digits.is_empty() || digits == "-" {
        return Some(0);
    }

    let value: i64 = digits.parse().ok()?;
    if negative {
        // i64::MIN은 절댓값이 범위를 벗어나므로 행을 버립니다.
        value.checked_abs().map(|v| -v)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn data_row(date: &str, close: &str, inst: &str, frgn: &str) -> String {
        format!(
            "<tr><td><span>{date}</span></td><td>{close}</td><td><em>▲</em> 500</td>\
             <td>+0.72%</td><td>1,000,000</td><td>{inst}</td><td>{frgn}</td>\
             <td>3,000,000</td><td>51.2%</td></tr>"
        )
    }

    #[test]
    fn test_parse_row_normalizes_numbers() {
        let row = cells(&[
            "2024.01.15",
            "70,000",
            "500",
            "+0.72%",
            "1,000,000",
            "+1,234",
            "-567",
        ]);
        let flow = parse_row(&row, FRGN_LAYOUT, today()).unwrap();

        assert_eq!(flow.trade_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(flow.close_price, Some(70000));
        assert_eq!(flow.institution_net_buy, Some(1234));
        assert_eq!(flow.foreigner_net_buy, Some(-567));
    }

    #[test]
    fn test_six_cell_row_has_no_foreigner_value() {
        let row = cells(&["2024.01.15", "70,000", "0", "0%", "10", "+15"]);
        let flow = parse_row(&row, FRGN_LAYOUT, today()).unwrap();
        assert_eq!(flow.institution_net_buy, Some(15));
        assert_eq!(flow.foreigner_net_buy, None);
    }

    #[test]
    fn test_non_numeric_cell_discards_row() {
        let row = cells(&["2024.01.15", "N/A", "0", "0%", "10", "1", "2"]);
        assert!(parse_row(&row, FRGN_LAYOUT, today()).is_none());
    }

    #[test]
    fn test_parse_trade_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_trade_date("2024.01.15", today()), Some(expected));
        assert_eq!(parse_trade_date("2024-01-15", today()), Some(expected));
        assert_eq!(parse_trade_date("2024/01/15", today()), Some(expected));
        assert_eq!(parse_trade_date("01.15", today()), Some(expected));
        assert_eq!(parse_trade_date("2024.02.30", today()), None);
        assert_eq!(parse_trade_date("70,000", today()), None);
        assert_eq!(parse_trade_date("", today()), None);
    }

    #[test]
    fn test_parse_signed_int_markers() {
        assert_eq!(parse_signed_int("+1,234"), Some(1234));
        assert_eq!(parse_signed_int("-567"), Some(-567));
        assert_eq!(parse_signed_int("▼ 1,200"), Some(-1200));
        assert_eq!(parse_signed_int(""), Some(0));
        assert_eq!(parse_signed_int("-"), Some(0));
        assert_eq!(parse_signed_int("0.72%"), None);
    }

    #[test]
    fn test_down_marker_with_i64_min_discards_row() {
        assert_eq!(parse_signed_int("▼ -9223372036854775808"), None);
        assert_eq!(
            parse_signed_int("-9223372036854775808"),
            Some(i64::MIN)
        );

        let row = cells(&[
            "2024.01.15",
            "70,000",
            "0",
            "0%",
            "10",
            "▼ -9223372036854775808",
            "+5",
        ]);
        assert!(parse_row(&row, FRGN_LAYOUT, today()).is_none());

        let mut html = String::from("<table>");
        for day in 1..=5 {
            html.push_str(&data_row(&format!("2024.01.{:02}", day), "1,000", "+1", "+2"));
        }
        html.push_str(&data_row("2024.01.06", "1,000", "▼ -9223372036854775808", "+2"));
        html.push_str("</table>");

        let mut rows = extract_rows(&html, today());
        let flows: Vec<_> = rows.by_ref().collect();
        assert_eq!(flows.len(), 5);
        assert_eq!(rows.discarded(), 1);
    }

    #[test]
    fn test_short_rows_are_discarded_without_error() {
        let mut html = String::from("<table>");
        html.push_str("<tr><th>날짜</th><th>종가</th></tr>");
        for day in 1..=7 {
            html.push_str(&data_row(&format!("2024.02.{:02}", day), "70,000", "+10", "-5"));
        }
        for _ in 0..3 {
            html.push_str("<tr><td colspan=\"9\"></td></tr>");
        }
        html.push_str("</table>");

        let mut rows = extract_rows(&html, today());
        let collected: Vec<_> = rows.by_ref().collect();

        assert_eq!(collected.len(), 7);
        // 헤더 행(td 없음) + 구분 행 3개
        assert_eq!(rows.discarded(), 4);
        assert!(rows.table_found());
        assert_eq!(
            collected[0].trade_date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_dated_table_beats_larger_undated_table() {
        let mut html = String::from("<table>");
        for i in 0..12 {
            html.push_str(&format!(
                "<tr><td>메뉴{i}</td><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td><td>f</td></tr>"
            ));
        }
        html.push_str("</table><table>");
        for day in 1..=6 {
            html.push_str(&data_row(&format!("2024.03.{:02}", day), "1,000", "+1", "+2"));
        }
        html.push_str("</table>");

        let flows: Vec<_> = extract_rows(&html, today()).collect();
        assert_eq!(flows.len(), 6);
        assert_eq!(flows[5].foreigner_net_buy, Some(2));
    }

    #[test]
    fn test_nested_table_rows_are_not_merged_into_outer() {
        let mut inner = String::from("<table class=\"type2\">");
        for day in 1..=5 {
            inner.push_str(&data_row(&format!("2024.01.{:02}", day), "2,000", "-3", "+4"));
        }
        inner.push_str("</table>");
        let html = format!(
            "<table><tr><td>{inner}</td></tr><tr><td>footer</td></tr></table>"
        );

        let flows: Vec<_> = extract_rows(&html, today()).collect();
        assert_eq!(flows.len(), 5);
        assert!(flows.iter().all(|f| f.institution_net_buy == Some(-3)));
    }

    #[test]
    fn test_no_table_yields_empty_sequence() {
        let mut rows = extract_rows("<html><body>점검 중</body></html>", today());
        assert!(rows.next().is_none());
        assert!(!rows.table_found());
    }

    proptest! {
        #[test]
        fn prop_grouped_numbers_parse_back(value in -10_000_000_000i64..10_000_000_000i64) {
            let digits = value.unsigned_abs().to_string();
            let mut grouped = String::new();
            for (i, c) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(c);
            }
            let text = if value < 0 { format!("-{}", grouped) } else { format!("+{}", grouped) };
            prop_assert_eq!(parse_signed_int(&text), Some(value));
        }
    }
}
