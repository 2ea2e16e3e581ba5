mod score;
mod store;

pub use score::derive_score;
pub use store::{DEFAULT_PERFORMANCE_WINDOW, PerformanceRecord, PerformanceStore};
