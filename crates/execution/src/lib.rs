pub mod error;
pub mod paper;

pub use error::ExecutionError;
pub use paper::PaperExecutionHandler;
