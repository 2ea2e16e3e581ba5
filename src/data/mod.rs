mod dataset;
mod partition;
mod provider;
mod synthetic;

pub use dataset::Dataset;
pub use partition::{MIN_PARTITION_SIZE, Partitioner, shard_range};
pub use provider::{DataConfig, DatasetProvider, Partition};
pub use synthetic::{BlobsConfig, gaussian_blobs};
