//! 일별 투자자별 매매 기록.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 페이지에서 추출한 한 거래일의 후보 행.
///
/// 아직 저장되지 않은 값이며 `(종목코드, trade_date)`가 자연키입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyInvestorFlow {
    pub trade_date: NaiveDate,
    pub close_price: Option<i64>,
    /// 기관 순매매량 (음수 = 순매도)
    pub institution_net_buy: Option<i64>,
    /// 외국인 순매매량 (음수 = 순매도)
    pub foreigner_net_buy: Option<i64>,
}

/// 저장된 매매 기록 (`stock_investor_trading`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct TradingRecord {
    pub id: i64,
    pub stock_code: String,
    pub stock_name: String,
    pub trade_date: NaiveDate,
    pub close_price: Option<i64>,
    pub institution_net_buy: Option<i64>,
    pub foreigner_net_buy: Option<i64>,
    /// 기관 누적 순매수 (누적 계산기만 갱신)
    pub institution_accum: i64,
    /// 외국인 누적 순매수 (누적 계산기만 갱신)
    pub foreigner_accum: i64,
    pub institution_trend_signal: Option<String>,
    pub institution_trend_score: Option<Decimal>,
    pub foreigner_trend_signal: Option<String>,
    pub foreigner_trend_score: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradingRecord {
    /// 저장된 행을 후보 행 형태로 변환합니다.
    pub fn flow(&self) -> DailyInvestorFlow {
        DailyInvestorFlow {
            trade_date: self.trade_date,
            close_price: self.close_price,
            institution_net_buy: self.institution_net_buy,
            foreigner_net_buy: self.foreigner_net_buy,
        }
    }
}

/// API를 통한 수동 등록 입력.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTradingRecord {
    pub stock_code: String,
    pub stock_name: String,
    pub trade_date: NaiveDate,
    #[serde(default)]
    pub close_price: Option<i64>,
    #[serde(default)]
    pub institution_net_buy: Option<i64>,
    #[serde(default)]
    pub foreigner_net_buy: Option<i64>,
}

/// 매매 기록 수정 입력. `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingRecordUpdate {
    pub stock_name: Option<String>,
    pub close_price: Option<i64>,
    pub institution_net_buy: Option<i64>,
    pub foreigner_net_buy: Option<i64>,
}

/// 추세 분석 결과. 수집기는 값을 해석하지 않고 저장만 합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendUpdate {
    pub institution_trend_signal: Option<String>,
    pub institution_trend_score: Option<Decimal>,
    pub foreigner_trend_signal: Option<String>,
    pub foreigner_trend_score: Option<Decimal>,
}

/// 누적 계산기가 기록하는 행 단위 갱신값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeUpdate {
    pub id: i64,
    pub institution_accum: i64,
    pub foreigner_accum: i64,
}

/// 일괄 삭제 범위.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum PurgeScope {
    /// 단일 종목
    Stock { stock_code: String },
    /// 명시한 종목 목록
    Codes { stock_codes: Vec<String> },
    /// 전체
    All,
}

impl PurgeScope {
    pub fn describe(&self) -> String {
        match self {
            PurgeScope::Stock { stock_code } => format!("종목 {}", stock_code),
            PurgeScope::Codes { stock_codes } => format!("{}개 종목", stock_codes.len()),
            PurgeScope::All => "전체".to_string(),
        }
    }
}
