//! 도메인 모델.

pub mod audit;
pub mod collection;
pub mod instrument;
pub mod trading;

pub use audit::*;
pub use collection::*;
pub use instrument::*;
pub use trading::*;
