use itertools::Itertools;
use tracing::{debug, info, span, Level};

use crate::config::{PartitionStrategy, PlannerConfig};
use crate::domain::types::Subset;
use crate::error::{DataError, PlanError};
use crate::partition::kmeans::ClusteringOracle;
use crate::setup::init::Instance;
use crate::utils::split_evenly;

/// Splits the non-depot locations of an instance into solver-sized subsets.
pub struct Partitioner<'a> {
    oracle: &'a dyn ClusteringOracle,
    strategy: PartitionStrategy,
    max_subset_size: usize,
    chunk_size: usize,
    seed: u64,
}

impl<'a> Partitioner<'a> {
    pub fn new(oracle: &'a dyn ClusteringOracle, config: &PlannerConfig) -> Self {
        Self {
            oracle,
            strategy: config.strategy,
            max_subset_size: config.max_subset_size,
            chunk_size: config.flat_chunk_size(),
            seed: config.seed,
        }
    }

    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_subset_size(mut self, max_subset_size: usize) -> Self {
        self.max_subset_size = max_subset_size.max(1);
        self.chunk_size = self.chunk_size.min(self.max_subset_size);
        self
    }

    /// Every non-depot location lands in exactly one subset; every subset is
    /// wrapped as `[O, .., D]`.
    pub fn partition(&self, instance: &Instance) -> Result<Vec<Subset>, PlanError> {
        let span = span!(Level::INFO, "partition", strategy = ?self.strategy);
        let _guard = span.enter();

        if self.max_subset_size == 0 || self.chunk_size == 0 {
            return Err(DataError::new("subset size cap and chunk size must be positive").into());
        }

        let customers: Vec<usize> = instance.customers().collect();
        let groups = match self.strategy {
            PartitionStrategy::Whole => vec![customers],
            PartitionStrategy::Flat { clusters } => self.flat(instance, &customers, clusters)?,
            PartitionStrategy::Bisection => {
                let mut groups = Vec::new();
                self.bisect(instance, customers, &mut groups)?;
                groups
            }
        };

        let subsets: Vec<Subset> = groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .enumerate()
            .map(|(id, group)| {
                Subset::new(id, instance.start_depot(), &group, instance.end_depot())
            })
            .collect();

        info!(
            "Partitioned {} locations into {} subsets (sizes {:?})",
            instance.customers().len(),
            subsets.len(),
            subsets.iter().map(|s| s.customers().len()).collect_vec()
        );
        Ok(subsets)
    }

    fn points(instance: &Instance, members: &[usize]) -> Vec<(f64, f64)> {
        members
            .iter()
            .map(|&i| instance.location(i).coordinates())
            .collect()
    }

    /// Groups members by label, keeping labels in ascending order and members in input order.
    fn group_by_label(members: &[usize], labels: &[usize]) -> Vec<Vec<usize>> {
        members
            .iter()
            .zip(labels)
            .map(|(&member, &label)| (label, member))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(label, _)| *label)
            .map(|(_, group)| group)
            .collect()
    }

    fn flat(
        &self,
        instance: &Instance,
        customers: &[usize],
        clusters: usize,
    ) -> Result<Vec<Vec<usize>>, PlanError> {
        let labels = self
            .oracle
            .cluster(&Self::points(instance, customers), clusters, self.seed)?;

        let mut groups = Vec::new();
        for cluster in Self::group_by_label(customers, &labels) {
            if cluster.len() > self.max_subset_size {
                let pieces = cluster.len().div_ceil(self.chunk_size);
                debug!(
                    "Cluster of {} locations chunked into {} pieces",
                    cluster.len(),
                    pieces
                );
                groups.extend(split_evenly(&cluster, pieces));
            } else {
                groups.push(cluster);
            }
        }
        Ok(groups)
    }

    fn bisect(
        &self,
        instance: &Instance,
        members: Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) -> Result<(), PlanError> {
        if members.len() <= self.max_subset_size {
            out.push(members);
            return Ok(());
        }

        let labels = self
            .oracle
            .cluster(&Self::points(instance, &members), 2, self.seed)?;
        let mut halves = Self::group_by_label(&members, &labels);
        if halves.len() < 2 {
            // All points fell into one cluster (e.g. identical coordinates).
            debug!(
                "2-means could not split {} locations, halving instead",
                members.len()
            );
            halves = split_evenly(&members, 2);
        }

        for half in halves {
            self.bisect(instance, half, out)?;
        }
        Ok(())
    }
}
