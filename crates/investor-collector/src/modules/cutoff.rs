//! 수집 기간 경계 판정.
//!
//! 페이지는 최신 거래일부터 내려오므로, 기준일보다 오래된 첫 행에서 해당 종목의
//! 전체 페이지 순회를 끝냅니다. 기준일과 같은 날은 포함합니다.

use chrono::{Months, NaiveDate, Utc};
use chrono_tz::Asia::Seoul;

/// 행 단위 판정 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffScanner {
    cutoff: NaiveDate,
}

impl CutoffScanner {
    pub fn new(cutoff: NaiveDate) -> Self {
        Self { cutoff }
    }

    /// `today`에서 `years`년 전을 기준일로 합니다.
    pub fn years_before(today: NaiveDate, years: u32) -> Self {
        let cutoff = today
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        Self::new(cutoff)
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn check(&self, trade_date: NaiveDate) -> ScanDecision {
        if trade_date < self.cutoff {
            ScanDecision::Stop
        } else {
            ScanDecision::Continue
        }
    }
}

/// 한국 시간 기준 오늘.
pub fn today_kst() -> NaiveDate {
    Utc::now().with_timezone(&Seoul).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let scanner = CutoffScanner::new(date(2023, 1, 1));
        assert_eq!(scanner.check(date(2023, 6, 1)), ScanDecision::Continue);
        assert_eq!(scanner.check(date(2023, 1, 1)), ScanDecision::Continue);
        assert_eq!(scanner.check(date(2022, 12, 31)), ScanDecision::Stop);
    }

    #[test]
    fn test_years_before_calendar_years() {
        let scanner = CutoffScanner::years_before(date(2024, 3, 15), 3);
        assert_eq!(scanner.cutoff(), date(2021, 3, 15));

        // 윤일은 월말로 맞춰집니다.
        let leap = CutoffScanner::years_before(date(2024, 2, 29), 1);
        assert_eq!(leap.cutoff(), date(2023, 2, 28));
    }
}
