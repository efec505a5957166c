//! 수집 파이프라인 모듈.

pub mod accumulate;
pub mod bootstrap;
pub mod cutoff;
pub mod instrument_collect;
pub mod orchestrator;
pub mod persist;
pub mod purge;

pub use accumulate::{cumulative_totals, AccumulateOutcome, AccumulateReport, Accumulator};
pub use bootstrap::{default_instruments, initialize_stock_list, DEFAULT_STOCK_LIST};
pub use cutoff::{today_kst, CutoffScanner, ScanDecision};
pub use instrument_collect::{CollectOutcome, InstrumentCollector, StopReason};
pub use orchestrator::{BatchOrchestrator, RunOptions, WORKFLOW_NAME};
pub use persist::{PersistenceWriter, SaveReport};
pub use purge::{purge_records, PurgeReport};
