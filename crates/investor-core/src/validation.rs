//! 입력 검증 헬퍼.

use chrono::NaiveDate;

use crate::error::{InvestorError, InvestorResult};

/// 수집 기간 허용 범위 (년).
pub const MIN_COLLECT_YEARS: u32 = 1;
pub const MAX_COLLECT_YEARS: u32 = 10;

/// 한 종목당 최대 조회 페이지 상한.
pub const MAX_PAGES_LIMIT: u32 = 1000;

pub const STOCK_NAME_MAX_LEN: usize = 100;
pub const TREND_SIGNAL_MAX_LEN: usize = 50;

/// 종목코드는 6자리 숫자여야 합니다.
pub fn is_valid_stock_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_stock_code(code: &str) -> InvestorResult<()> {
    if is_valid_stock_code(code) {
        Ok(())
    } else {
        Err(InvestorError::InvalidInput(format!(
            "종목코드는 6자리 숫자여야 합니다: {}",
            code
        )))
    }
}

pub fn validate_stock_name(name: &str) -> InvestorResult<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > STOCK_NAME_MAX_LEN {
        return Err(InvestorError::InvalidInput(format!(
            "종목명은 1자 이상 {}자 이하여야 합니다",
            STOCK_NAME_MAX_LEN
        )));
    }
    Ok(())
}

/// `YYYY-MM-DD` 형식의 날짜 문자열을 파싱합니다.
pub fn parse_iso_date(value: &str) -> InvestorResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        InvestorError::InvalidInput(format!("날짜는 YYYY-MM-DD 형식이어야 합니다: {}", value))
    })
}

pub fn validate_collect_years(years: u32) -> InvestorResult<()> {
    if !(MIN_COLLECT_YEARS..=MAX_COLLECT_YEARS).contains(&years) {
        return Err(InvestorError::InvalidInput(format!(
            "수집 기간은 {}년 이상 {}년 이하여야 합니다: {}",
            MIN_COLLECT_YEARS, MAX_COLLECT_YEARS, years
        )));
    }
    Ok(())
}

pub fn validate_max_pages(max_pages: u32) -> InvestorResult<()> {
    if max_pages == 0 || max_pages > MAX_PAGES_LIMIT {
        return Err(InvestorError::InvalidInput(format!(
            "최대 페이지 수는 1 이상 {} 이하여야 합니다: {}",
            MAX_PAGES_LIMIT, max_pages
        )));
    }
    Ok(())
}

pub fn validate_trend_signal(signal: Option<&str>) -> InvestorResult<()> {
    match signal {
        Some(s) if s.chars().count() > TREND_SIGNAL_MAX_LEN => Err(InvestorError::InvalidInput(
            format!("추세 신호는 {}자 이하여야 합니다", TREND_SIGNAL_MAX_LEN),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stock_code() {
        assert!(is_valid_stock_code("005930"));
        assert!(!is_valid_stock_code("05930"));
        assert!(!is_valid_stock_code("00593A"));
        assert!(!is_valid_stock_code("0059300"));
    }

    #[test]
    fn test_collect_years_bounds() {
        assert!(validate_collect_years(1).is_ok());
        assert!(validate_collect_years(10).is_ok());
        assert!(validate_collect_years(0).is_err());
        assert!(validate_collect_years(11).is_err());
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(parse_iso_date("2024.01.15").is_err());
    }

    #[test]
    fn test_stock_name_length() {
        assert!(validate_stock_name("삼성전자").is_ok());
        assert!(validate_stock_name("  ").is_err());
        assert!(validate_stock_name(&"가".repeat(101)).is_err());
    }

    proptest! {
        #[test]
        fn prop_six_digit_codes_are_valid(n in 0u32..1_000_000) {
            let code = format!("{:06}", n);
            prop_assert!(is_valid_stock_code(&code));
        }
    }
}
