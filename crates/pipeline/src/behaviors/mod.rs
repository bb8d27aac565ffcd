//! The standard behaviors.

mod logging;
mod retry;
mod transaction;
mod validation;

pub use logging::LoggingBehavior;
pub use retry::RetryBehavior;
pub use transaction::TransactionBehavior;
pub use validation::{ValidationBehavior, Validator};
