pub mod kmeans;
pub mod strategy;

pub use kmeans::{ClusteringOracle, KMeansClustering};
pub use strategy::Partitioner;
