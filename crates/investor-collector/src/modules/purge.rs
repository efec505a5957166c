//! 매매 기록 일괄 삭제.

use investor_core::validation::validate_stock_code;
use investor_core::PurgeScope;
use investor_data::TradingStore;
use serde::Serialize;
use tracing::warn;

use crate::error::{CollectorError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub scope: String,
    pub deleted: u64,
}

/// 범위를 검증한 뒤 삭제합니다. 잘못된 종목코드가 하나라도 있으면 아무것도 지우지 않습니다.
pub async fn purge_records(store: &dyn TradingStore, scope: &PurgeScope) -> Result<PurgeReport> {
    match scope {
        PurgeScope::All => {}
        PurgeScope::Stock { stock_code } => validate_stock_code(stock_code)?,
        PurgeScope::Codes { stock_codes } => {
            if stock_codes.is_empty() {
                return Err(CollectorError::Validation(
                    "삭제할 종목코드가 없습니다".to_string(),
                ));
            }
            for code in stock_codes {
                validate_stock_code(code)?;
            }
        }
    }

    let deleted = store.purge(scope).await?;
    warn!(scope = %scope.describe(), deleted, "매매 기록 삭제");

    Ok(PurgeReport {
        scope: scope.describe(),
        deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use investor_core::DailyInvestorFlow;
    use investor_data::MemoryTradingStore;

    async fn store_with(codes: &[&str]) -> MemoryTradingStore {
        let store = MemoryTradingStore::new();
        let flow = DailyInvestorFlow {
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close_price: None,
            institution_net_buy: None,
            foreigner_net_buy: None,
        };
        for code in codes {
            store.insert_flows(code, "종목", &[flow]).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_purge_codes() {
        let store = store_with(&["005930", "000660", "035420"]).await;
        let scope = PurgeScope::Codes {
            stock_codes: vec!["005930".to_string(), "000660".to_string()],
        };
        let report = purge_records(&store, &scope).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_code_deletes_nothing() {
        let store = store_with(&["005930"]).await;
        let scope = PurgeScope::Codes {
            stock_codes: vec!["005930".to_string(), "59A0".to_string()],
        };
        assert!(matches!(
            purge_records(&store, &scope).await,
            Err(CollectorError::Validation(_))
        ));
        assert_eq!(store.record_count(), 1);

        let empty = PurgeScope::Codes { stock_codes: vec![] };
        assert!(purge_records(&store, &empty).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_all() {
        let store = store_with(&["005930", "000660"]).await;
        let report = purge_records(&store, &PurgeScope::All).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(store.record_count(), 0);
    }
}
