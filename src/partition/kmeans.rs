use linfa::prelude::*;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::config::constant::{KMEANS_MAX_ITERATIONS, KMEANS_TOLERANCE};
use crate::error::PlanError;

/// Maps points to cluster labels in `0..k`. Must be deterministic for a fixed seed.
pub trait ClusteringOracle: Send + Sync {
    fn cluster(&self, points: &[(f64, f64)], k: usize, seed: u64) -> Result<Vec<usize>, PlanError>;
}

/// Lloyd's k-means from `linfa-clustering`, seeded through `ChaCha8Rng`.
#[derive(Debug, Clone)]
pub struct KMeansClustering {
    pub max_iterations: u64,
    pub tolerance: f64,
}

impl Default for KMeansClustering {
    fn default() -> Self {
        Self {
            max_iterations: KMEANS_MAX_ITERATIONS,
            tolerance: KMEANS_TOLERANCE,
        }
    }
}

impl ClusteringOracle for KMeansClustering {
    fn cluster(&self, points: &[(f64, f64)], k: usize, seed: u64) -> Result<Vec<usize>, PlanError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let k = k.clamp(1, points.len());
        if k == 1 {
            return Ok(vec![0; points.len()]);
        }

        let flat: Vec<f64> = points.iter().flat_map(|&(x, y)| [x, y]).collect();
        let records = Array2::from_shape_vec((points.len(), 2), flat)
            .map_err(|e| PlanError::Clustering(e.to_string()))?;
        let dataset = DatasetBase::from(records.clone());

        let rng = ChaCha8Rng::seed_from_u64(seed);
        let model = KMeans::params_with_rng(k, rng)
            .max_n_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| PlanError::Clustering(e.to_string()))?;

        let labels: Array1<usize> = model.predict(&records);
        trace!("k-means labels for {} points: {:?}", points.len(), labels);
        Ok(labels.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<(f64, f64)> {
        let mut points = Vec::new();
        for i in 0..6 {
            points.push((i as f64 * 0.1, 0.0));
            points.push((100.0 + i as f64 * 0.1, 50.0));
        }
        points
    }

    #[test]
    fn separates_distant_blobs() {
        let points = two_blobs();
        let labels = KMeansClustering::default().cluster(&points, 2, 0).unwrap();

        assert_eq!(labels.len(), points.len());
        for (i, &(x, _)) in points.iter().enumerate() {
            let expected_same = labels[0];
            if x < 50.0 {
                assert_eq!(labels[i], expected_same);
            } else {
                assert_ne!(labels[i], expected_same);
            }
        }
    }

    #[test]
    fn same_seed_same_labels() {
        let points: Vec<(f64, f64)> = (0..30)
            .map(|i| ((i * 7 % 13) as f64, (i * 5 % 11) as f64))
            .collect();
        let oracle = KMeansClustering::default();
        assert_eq!(
            oracle.cluster(&points, 4, 42).unwrap(),
            oracle.cluster(&points, 4, 42).unwrap()
        );
    }

    #[test]
    fn cluster_count_is_clamped() {
        let labels = KMeansClustering::default()
            .cluster(&[(0.0, 0.0), (1.0, 1.0)], 5, 0)
            .unwrap();
        assert!(labels.iter().all(|&l| l < 2));
    }
}
