//! 수집 대상 종목.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 종목 레지스트리 레코드 (`stock_list`).
///
/// 수집 파이프라인은 이 레코드를 읽기만 하며, 누적 기준값은 관리자 작업으로만 변경됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Instrument {
    pub id: i64,
    pub stock_code: String,
    pub stock_name: String,
    pub init_date: Option<NaiveDate>,
    /// 기관 누적 기준값
    pub institution_accum_init: i64,
    /// 외국인 누적 기준값
    pub foreigner_accum_init: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// 로그/실패 목록에 쓰는 "코드 종목명" 표기.
    pub fn label(&self) -> String {
        format!("{} {}", self.stock_code, self.stock_name)
    }

    pub fn as_ref_pair(&self) -> InstrumentRef {
        InstrumentRef::new(&self.stock_code, &self.stock_name)
    }
}

/// 수집 루프에서 사용하는 가벼운 종목 식별자.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub code: String,
    pub name: String,
}

impl InstrumentRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}

/// 신규 종목 등록 입력.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstrument {
    pub stock_code: String,
    pub stock_name: String,
    #[serde(default)]
    pub init_date: Option<NaiveDate>,
    #[serde(default)]
    pub institution_accum_init: i64,
    #[serde(default)]
    pub foreigner_accum_init: i64,
}

/// 종목 수정 입력. `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentUpdate {
    pub stock_name: Option<String>,
    pub init_date: Option<NaiveDate>,
}

/// 누적 기준값 변경 입력.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumBaseline {
    pub institution_accum_init: i64,
    pub foreigner_accum_init: i64,
}

impl AccumBaseline {
    pub fn zero() -> Self {
        Self {
            institution_accum_init: 0,
            foreigner_accum_init: 0,
        }
    }

    /// 기준값은 음수가 될 수 없습니다.
    pub fn is_valid(&self) -> bool {
        self.institution_accum_init >= 0 && self.foreigner_accum_init >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let r = InstrumentRef::new("005930", "삼성전자");
        assert_eq!(r.label(), "005930 삼성전자");
    }

    #[test]
    fn test_baseline_non_negative() {
        assert!(AccumBaseline::zero().is_valid());
        let bad = AccumBaseline {
            institution_accum_init: -1,
            foreigner_accum_init: 0,
        };
        assert!(!bad.is_valid());
    }
}
