pub mod error;
pub mod ledger;
pub mod sizing;

pub use error::RiskError;
pub use ledger::{OpenRequest, RiskLedger};
pub use sizing::PositionSizer;
