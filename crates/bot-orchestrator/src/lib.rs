//! Trading orchestration built on the actor pattern: one task owns the
//! risk state and is controlled through Tokio channels.

pub mod commands;
pub mod execution_wrapper;
pub mod handle;
pub mod trader;

pub use commands::{TraderCommand, TraderStatus};
pub use execution_wrapper::ExecutionWrapper;
pub use handle::TraderHandle;
pub use trader::Trader;
