pub mod evaluator;
pub mod rule;

pub use evaluator::AlertEvaluator;
pub use rule::{AlertEvent, AlertRule};
