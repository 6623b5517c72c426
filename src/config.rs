use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use tracing::{debug, info};

use crate::error::DataError;

pub mod constant {
    pub const VEHICLE_CAPACITY: u64 = 12;
    pub const SEED: u64 = 0;
    pub const MAX_SUBSET_SIZE: usize = 40;
    pub const FLAT_CLUSTERS: usize = 8;
    pub const CHUNK_SIZE: usize = 10;
    pub const ROUTE_SLACK: usize = 2;
    pub const MAX_RETRIES: usize = 3;
    pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;
    pub const KMEANS_MAX_ITERATIONS: u64 = 300;
    pub const KMEANS_TOLERANCE: f64 = 1e-4;
    pub const EXCLUDED_CATEGORY: &str = "Pick-up";
    pub const DEMAND_HEADER_ROWS: usize = 2;
    pub const DEMAND_COLUMN: usize = 6;
    pub const SYNTHETIC_LOCATIONS: usize = 24;
    pub const LOCATIONS_PATH: &str = "data/locations.json";
    pub const COSTS_PATH: &str = "data/travel_times_matrix.json";
    pub const DEMANDS_PATH: &str = "data/FBWMLocationsDemands.csv";
    pub const REPORT_CSV_PATH: &str = "routes.csv";
    pub const REPORT_JSON_PATH: &str = "routes.json";
}

/// How the non-depot locations are split into solver-sized subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStrategy {
    /// One model over every location.
    Whole,
    /// k-means into a fixed number of clusters, oversized clusters chunked.
    Flat { clusters: usize },
    /// Repeated 2-means until every part is within the size cap.
    Bisection,
}

impl FromStr for PartitionStrategy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" => Ok(PartitionStrategy::Whole),
            "flat" => Ok(PartitionStrategy::Flat {
                clusters: constant::FLAT_CLUSTERS,
            }),
            "bisection" => Ok(PartitionStrategy::Bisection),
            other => Err(DataError::new(format!(
                "unknown partition strategy '{other}' (expected whole, flat or bisection)"
            ))),
        }
    }
}

/// What to do with a delivery location whose recorded demand is not positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDemandPolicy {
    /// Recorded zero is a data-entry placeholder: the stop still happens with one pallet.
    CoerceToOne,
    Reject,
}

impl FromStr for ZeroDemandPolicy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coerce" | "coerce-to-one" => Ok(ZeroDemandPolicy::CoerceToOne),
            "reject" => Ok(ZeroDemandPolicy::Reject),
            other => Err(DataError::new(format!(
                "unknown zero-demand policy '{other}' (expected coerce or reject)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub capacity: u64,
    pub strategy: PartitionStrategy,
    pub max_subset_size: usize,
    pub chunk_size: usize,
    pub seed: u64,
    pub route_slack: usize,
    pub max_retries: usize,
    pub solver_timeout: Option<Duration>,
    pub tolerance: f64,
    pub parallel: bool,
    pub zero_demand: ZeroDemandPolicy,
    pub excluded_categories: Vec<String>,
    pub demand_header_rows: usize,
    pub demand_column: usize,
    pub locations_path: String,
    pub costs_path: String,
    pub demands_path: String,
    pub report_csv_path: String,
    pub report_json_path: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            capacity: constant::VEHICLE_CAPACITY,
            strategy: PartitionStrategy::Bisection,
            max_subset_size: constant::MAX_SUBSET_SIZE,
            chunk_size: constant::CHUNK_SIZE,
            seed: constant::SEED,
            route_slack: constant::ROUTE_SLACK,
            max_retries: constant::MAX_RETRIES,
            solver_timeout: None,
            tolerance: constant::INTEGRALITY_TOLERANCE,
            parallel: false,
            zero_demand: ZeroDemandPolicy::CoerceToOne,
            excluded_categories: vec![constant::EXCLUDED_CATEGORY.to_string()],
            demand_header_rows: constant::DEMAND_HEADER_ROWS,
            demand_column: constant::DEMAND_COLUMN,
            locations_path: constant::LOCATIONS_PATH.to_string(),
            costs_path: constant::COSTS_PATH.to_string(),
            demands_path: constant::DEMANDS_PATH.to_string(),
            report_csv_path: constant::REPORT_CSV_PATH.to_string(),
            report_json_path: constant::REPORT_JSON_PATH.to_string(),
        }
    }
}

impl PlannerConfig {
    /// Defaults overridden by `CVRP_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, DataError> {
        dotenv().ok();
        let mut config = PlannerConfig::default();

        if let Some(strategy) = read_var::<PartitionStrategy>("CVRP_STRATEGY")? {
            config.strategy = strategy;
        }
        if let Some(clusters) = read_var::<usize>("CVRP_CLUSTERS")? {
            config.strategy = PartitionStrategy::Flat { clusters };
        }
        if let Some(v) = read_var("CVRP_CAPACITY")? {
            config.capacity = v;
        }
        if let Some(v) = read_var("CVRP_MAX_SUBSET_SIZE")? {
            config.max_subset_size = v;
        }
        if let Some(v) = read_var("CVRP_CHUNK_SIZE")? {
            config.chunk_size = v;
        }
        if let Some(v) = read_var("CVRP_SEED")? {
            config.seed = v;
        }
        if let Some(v) = read_var("CVRP_ROUTE_SLACK")? {
            config.route_slack = v;
        }
        if let Some(v) = read_var("CVRP_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(secs) = read_var::<u64>("CVRP_SOLVER_TIMEOUT_SECS")? {
            config.solver_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(v) = read_var("CVRP_TOLERANCE")? {
            config.tolerance = v;
        }
        if let Some(v) = read_var("CVRP_PARALLEL")? {
            config.parallel = v;
        }
        if let Some(v) = read_var("CVRP_ZERO_DEMAND")? {
            config.zero_demand = v;
        }
        if let Ok(raw) = env::var("CVRP_EXCLUDED_CATEGORIES") {
            config.excluded_categories = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(path) = env::var("CVRP_LOCATIONS") {
            config.locations_path = path;
        }
        if let Ok(path) = env::var("CVRP_COSTS") {
            config.costs_path = path;
        }
        if let Ok(path) = env::var("CVRP_DEMANDS") {
            config.demands_path = path;
        }
        if let Ok(path) = env::var("CVRP_REPORT_CSV") {
            config.report_csv_path = path;
        }
        if let Ok(path) = env::var("CVRP_REPORT_JSON") {
            config.report_json_path = path;
        }

        config.check()?;
        info!(
            "Loaded planner config: strategy {:?}, cap {}, Q {}",
            config.strategy, config.max_subset_size, config.capacity
        );
        debug!("{:?}", config);
        Ok(config)
    }

    pub fn check(&self) -> Result<(), DataError> {
        if self.capacity == 0 {
            return Err(DataError::new("vehicle capacity must be positive"));
        }
        if self.max_subset_size == 0 || self.chunk_size == 0 {
            return Err(DataError::new("subset size cap and chunk size must be positive"));
        }
        if let PartitionStrategy::Flat { clusters: 0 } = self.strategy {
            return Err(DataError::new("flat partitioning needs at least one cluster"));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 0.5) {
            return Err(DataError::new("tolerance must lie in (0, 0.5)"));
        }
        Ok(())
    }

    /// Largest subset the flat strategy emits: the chunk size, never above the global cap.
    pub fn flat_chunk_size(&self) -> usize {
        self.chunk_size.min(self.max_subset_size)
    }
}

fn read_var<T: FromStr>(name: &str) -> Result<Option<T>, DataError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DataError::new(format!("{name} has an invalid value '{raw}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategies() {
        assert_eq!("whole".parse::<PartitionStrategy>(), Ok(PartitionStrategy::Whole));
        assert_eq!(
            "Bisection".parse::<PartitionStrategy>(),
            Ok(PartitionStrategy::Bisection)
        );
        assert!("kmeans++".parse::<PartitionStrategy>().is_err());
    }

    #[test]
    fn default_config_is_consistent() {
        let config = PlannerConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.capacity, 12);
        assert_eq!(config.flat_chunk_size(), 10);
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = PlannerConfig {
            capacity: 0,
            ..PlannerConfig::default()
        };
        assert!(config.check().is_err());
    }
}
