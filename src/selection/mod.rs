mod performance;
mod policy;
mod randomized;
mod uniform;

pub use performance::PerformanceBasedSelection;
pub use policy::{SelectionContext, SelectionPolicy, uniform_sample};
pub use randomized::RandomizedExplorationSelection;
pub use uniform::UniformSelection;
