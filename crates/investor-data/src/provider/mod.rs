//! 외부 데이터 소스.
//!
//! - `naver`: 네이버 금융 매매동향 페이지 요청
//! - `frgn_table`: 페이지 표에서 일별 행 추출

pub mod frgn_table;
pub mod naver;

pub use frgn_table::{extract_rows, parse_signed_int, parse_trade_date, FlowRows};
pub use naver::{NaverInvestorFetcher, PageFetch, PageSource, NAVER_FINANCE_BASE_URL};
