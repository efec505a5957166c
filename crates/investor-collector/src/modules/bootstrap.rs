//! 기본 수집 대상 종목 등록.

use investor_core::InstrumentRef;
use investor_data::TradingStore;
use tracing::info;

use crate::Result;

/// 시가총액 상위 50개 종목 (코드, 종목명).
pub const DEFAULT_STOCK_LIST: &[(&str, &str)] = &[
    ("005930", "삼성전자"),
    ("000660", "SK하이닉스"),
    ("207940", "삼성바이오로직스"),
    ("373220", "LG에너지솔루션"),
    ("005380", "현대차"),
    ("068270", "셀트리온"),
    ("000270", "기아"),
    ("035420", "NAVER"),
    ("105560", "KB금융"),
    ("012450", "한화에어로스페이스"),
    ("005490", "POSCO홀딩스"),
    ("329180", "HD현대중공업"),
    ("012330", "현대모비스"),
    ("055550", "신한지주"),
    ("042660", "한화오션"),
    ("138040", "메리츠금융지주"),
    ("028260", "삼성물산"),
    ("035720", "카카오"),
    ("096770", "SK이노베이션"),
    ("000810", "삼성화재"),
    ("051910", "LG화학"),
    ("086790", "하나금융지주"),
    ("010130", "고려아연"),
    ("011200", "HMM"),
    ("034020", "두산에너빌리티"),
    ("032830", "삼성생명"),
    ("259960", "크래프톤"),
    ("009540", "HD한국조선해양"),
    ("015760", "한국전력"),
    ("006400", "삼성SDI"),
    ("066570", "LG전자"),
    ("402340", "SK스퀘어"),
    ("010140", "삼성중공업"),
    ("030200", "KT"),
    ("024110", "기업은행"),
    ("316140", "우리금융지주"),
    ("033780", "KT&G"),
    ("004990", "롯데지주"),
    ("017670", "SK텔레콤"),
    ("267260", "HD현대일렉트릭"),
    ("003550", "LG"),
    ("323410", "카카오뱅크"),
    ("003670", "포스코퓨처엠"),
    ("047050", "포스코인터내셔널"),
    ("009150", "삼성전기"),
    ("034730", "SK"),
    ("000100", "유한양행"),
    ("352820", "하이브"),
    ("018260", "삼성에스디에스"),
    ("086280", "현대글로비스"),
];

pub fn default_instruments() -> Vec<InstrumentRef> {
    DEFAULT_STOCK_LIST
        .iter()
        .map(|(code, name)| InstrumentRef::new(*code, *name))
        .collect()
}

/// 없는 기본 종목만 등록하고 새로 등록된 수를 반환합니다.
pub async fn initialize_stock_list(store: &dyn TradingStore) -> Result<u64> {
    let inserted = store.ensure_instruments(&default_instruments()).await?;
    info!(
        inserted,
        defaults = DEFAULT_STOCK_LIST.len(),
        "기본 종목 목록 초기화 완료"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use investor_core::validation::is_valid_stock_code;
    use investor_data::MemoryTradingStore;
    use std::collections::HashSet;

    #[test]
    fn test_default_list_is_well_formed() {
        assert_eq!(DEFAULT_STOCK_LIST.len(), 50);
        let codes: HashSet<_> = DEFAULT_STOCK_LIST.iter().map(|(c, _)| *c).collect();
        assert_eq!(codes.len(), 50);
        assert!(DEFAULT_STOCK_LIST.iter().all(|(c, _)| is_valid_stock_code(c)));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = MemoryTradingStore::with_instruments(vec![InstrumentRef::new("005930", "삼성전자")]);
        assert_eq!(initialize_stock_list(&store).await.unwrap(), 49);
        assert_eq!(initialize_stock_list(&store).await.unwrap(), 0);
        assert_eq!(store.list_instruments().await.unwrap().len(), 50);
    }
}
