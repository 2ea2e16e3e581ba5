mod aggregator;
mod fedavg;
mod metrics;

pub use aggregator::Aggregator;
pub use fedavg::{FedAvg, weighted_mean};
pub use metrics::{EvaluateMetricsFn, FitMetricsFn, mean_accuracy, weighted_fit_metrics};
