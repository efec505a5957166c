//! PostgreSQL 저장소.
//!
//! 저장소는 `PgPool`(또는 트랜잭션)을 인자로 받는 정적 메서드 묶음입니다.
//! 쓰기 작업은 같은 트랜잭션 안에서 감사 로그를 남깁니다.

pub mod checkpoint;
pub mod database;
pub mod history;
pub mod stock;
pub mod trading;

pub use checkpoint::{CheckpointRepository, CheckpointStatus};
pub use database::{Database, DbSession};
pub use history::HistoryRepository;
pub use stock::StockRepository;
pub use trading::TradingRepository;
