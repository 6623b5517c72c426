use std::ops::Range;

use tracing::{debug, info, warn};

use crate::config::{PlannerConfig, ZeroDemandPolicy};
use crate::domain::types::Location;
use crate::error::DataError;
use crate::setup::init_types::LocationRecord;

/// Read-only routing data. Physical locations are `0..N` with the depot at 0;
/// index `N` is the end-depot copy `D`, cost-equivalent to the start depot `O`.
#[derive(Debug, Clone)]
pub struct Instance {
    locations: Vec<Location>,
    costs: Vec<Vec<f64>>,
    demands: Vec<u64>,
    capacity: u64,
}

impl Instance {
    /// Builds an instance from index-aligned locations, raw demands and costs.
    ///
    /// The cost matrix must be square and cover at least every location; extra
    /// rows and columns are dropped. The depot's demand is forced to zero.
    pub fn new(
        mut locations: Vec<Location>,
        raw_demands: &[i64],
        costs: Vec<Vec<f64>>,
        capacity: u64,
        zero_demand: ZeroDemandPolicy,
    ) -> Result<Self, DataError> {
        let n = locations.len();
        if n == 0 {
            return Err(DataError::new("no locations: the depot is required"));
        }
        if capacity == 0 {
            return Err(DataError::new("vehicle capacity must be positive"));
        }
        if raw_demands.len() != n {
            return Err(DataError::new(format!(
                "demand vector has {} entries for {} locations",
                raw_demands.len(),
                n
            )));
        }

        let costs = square_costs(costs, n)?;

        let mut demands = Vec::with_capacity(n + 1);
        for (i, &raw) in raw_demands.iter().enumerate() {
            let demand = if i == 0 {
                if raw != 0 {
                    warn!("Depot has recorded demand {}, treating it as 0", raw);
                }
                0
            } else {
                resolve_demand(i, &locations[i].id, raw, capacity, zero_demand)?
            };
            locations[i].demand = demand;
            demands.push(demand);
        }
        demands.push(0);

        info!(
            "Instance ready: {} locations, total demand {}, Q = {}",
            n,
            demands.iter().sum::<u64>(),
            capacity
        );

        Ok(Self {
            locations,
            costs,
            demands,
            capacity,
        })
    }

    /// Builds an instance from on-disk records: drops excluded categories and
    /// re-indexes the raw cost matrix to the kept locations.
    ///
    /// `delivery_demands` holds one value per kept non-depot location, in order.
    pub fn from_records(
        records: &[LocationRecord],
        raw_costs: Vec<Vec<f64>>,
        delivery_demands: &[i64],
        config: &PlannerConfig,
    ) -> Result<Self, DataError> {
        let mut kept: Vec<(usize, Location)> = Vec::new();
        for (position, record) in records.iter().enumerate() {
            let kind = record.kind.as_deref().ok_or_else(|| {
                DataError::new(format!("location record {position} has no type"))
            })?;
            if config.excluded_categories.iter().any(|c| c == kind) {
                debug!("Skipping location {} of kind '{}'", position, kind);
                continue;
            }
            let (Some(long), Some(lat)) = (record.long, record.lat) else {
                return Err(DataError::new(format!(
                    "location record {position} lacks coordinates"
                )));
            };
            kept.push((
                position,
                Location::new(record.identity(position), kind, long, lat),
            ));
        }

        if kept.is_empty() {
            return Err(DataError::new("every location was filtered out"));
        }
        let needed = kept.len() - 1;
        if delivery_demands.len() < needed {
            return Err(DataError::new(format!(
                "demand table has {} rows for {} delivery locations",
                delivery_demands.len(),
                needed
            )));
        }

        let raw_n = raw_costs.len();
        if raw_costs.iter().any(|row| row.len() != raw_n) {
            return Err(DataError::new("cost matrix is not square"));
        }
        if let Some((position, _)) = kept.iter().find(|(p, _)| *p >= raw_n) {
            return Err(DataError::new(format!(
                "cost matrix of size {raw_n} does not cover location record {position}"
            )));
        }
        let costs: Vec<Vec<f64>> = kept
            .iter()
            .map(|(p, _)| kept.iter().map(|(q, _)| raw_costs[*p][*q]).collect())
            .collect();

        let mut raw_demands = Vec::with_capacity(kept.len());
        raw_demands.push(0);
        raw_demands.extend_from_slice(&delivery_demands[..needed]);

        info!(
            "Kept {} of {} location records",
            kept.len(),
            records.len()
        );
        let locations = kept.into_iter().map(|(_, loc)| loc).collect();
        Instance::new(
            locations,
            &raw_demands,
            costs,
            config.capacity,
            config.zero_demand,
        )
    }

    /// Number of physical locations `N`, depot included.
    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    pub fn start_depot(&self) -> usize {
        0
    }

    pub fn end_depot(&self) -> usize {
        self.locations.len()
    }

    pub fn is_depot(&self, index: usize) -> bool {
        index == self.start_depot() || index == self.end_depot()
    }

    /// Non-depot location indices.
    pub fn customers(&self) -> Range<usize> {
        1..self.locations.len()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.costs[from][to]
    }

    pub fn demand(&self, index: usize) -> u64 {
        self.demands[index]
    }

    /// Demand per index, `D` included.
    pub fn demands(&self) -> &[u64] {
        &self.demands
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// The physical location behind an index; `D` resolves to the depot.
    pub fn location(&self, index: usize) -> &Location {
        if index == self.end_depot() {
            &self.locations[0]
        } else {
            &self.locations[index]
        }
    }

    pub fn total_demand(&self, nodes: &[usize]) -> u64 {
        nodes.iter().map(|&i| self.demands[i]).sum()
    }

    /// True for every index the route model may reference, both depot copies included.
    pub fn contains(&self, index: usize) -> bool {
        index <= self.end_depot()
    }
}

/// Truncates to `n x n`, then appends the end-depot copy so that
/// `C[i][D] == C[i][O]` and `C[D][j] == C[O][j]`.
fn square_costs(mut costs: Vec<Vec<f64>>, n: usize) -> Result<Vec<Vec<f64>>, DataError> {
    let size = costs.len();
    if costs.iter().any(|row| row.len() != size) {
        return Err(DataError::new("cost matrix is not square"));
    }
    if size < n {
        return Err(DataError::new(format!(
            "cost matrix of size {size} is smaller than the {n} locations"
        )));
    }

    costs.truncate(n);
    for (i, row) in costs.iter_mut().enumerate() {
        row.truncate(n);
        if let Some(bad) = row.iter().position(|c| !c.is_finite() || *c < 0.0) {
            return Err(DataError::new(format!(
                "cost {} -> {} is not a finite non-negative value",
                i, bad
            )));
        }
        let to_depot = row[0];
        row.push(to_depot);
    }
    let end_row = costs[0].clone();
    costs.push(end_row);
    Ok(costs)
}

fn resolve_demand(
    index: usize,
    id: &str,
    raw: i64,
    capacity: u64,
    policy: ZeroDemandPolicy,
) -> Result<u64, DataError> {
    if raw <= 0 {
        return match policy {
            ZeroDemandPolicy::CoerceToOne => {
                debug!(
                    "Location {} ({}) has demand {}, coercing to 1",
                    index, id, raw
                );
                Ok(1)
            }
            ZeroDemandPolicy::Reject => Err(DataError::new(format!(
                "location {index} ({id}) has non-positive demand {raw}"
            ))),
        };
    }
    let demand = raw as u64;
    if demand > capacity {
        return Err(DataError::new(format!(
            "location {index} ({id}) demands {demand} pallets, more than a vehicle holds ({capacity})"
        )));
    }
    Ok(demand)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect()
    }

    fn locations(n: usize) -> Vec<Location> {
        (0..n)
            .map(|i| Location::new(format!("L{i}"), "Agency", i as f64, 0.0))
            .collect()
    }

    #[test]
    fn end_depot_copies_start_depot_costs() {
        let instance = Instance::new(
            locations(4),
            &[0, 2, 3, 4],
            grid(4),
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .unwrap();

        assert_eq!(instance.end_depot(), 4);
        for i in 0..=4 {
            assert_eq!(instance.cost(i, 4), instance.cost(i, 0));
        }
        assert_eq!(instance.demand(4), 0);
        assert_eq!(instance.location(4).id, "L0");
    }

    #[test]
    fn zero_demand_is_coerced_to_one() {
        let instance = Instance::new(
            locations(3),
            &[0, 0, -2],
            grid(3),
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .unwrap();
        assert_eq!(instance.demands(), &[0, 1, 1, 0]);
        assert_eq!(instance.locations()[1].demand, 1);
    }

    #[test]
    fn zero_demand_can_be_rejected() {
        let err = Instance::new(
            locations(2),
            &[0, 0],
            grid(2),
            12,
            ZeroDemandPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.message().contains("non-positive"));
    }

    #[test]
    fn depot_demand_is_forced_to_zero() {
        let instance = Instance::new(
            locations(2),
            &[5, 3],
            grid(2),
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .unwrap();
        assert_eq!(instance.demand(0), 0);
    }

    #[test]
    fn demand_above_capacity_is_a_data_error() {
        let result = Instance::new(
            locations(2),
            &[0, 13],
            grid(2),
            12,
            ZeroDemandPolicy::CoerceToOne,
        );
        assert!(result.is_err());
    }

    #[test]
    fn non_square_matrix_is_a_data_error() {
        let mut costs = grid(3);
        costs[1].pop();
        let err = Instance::new(
            locations(3),
            &[0, 1, 1],
            costs,
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .unwrap_err();
        assert!(err.message().contains("not square"));
    }

    #[test]
    fn larger_matrix_is_truncated() {
        let instance = Instance::new(
            locations(3),
            &[0, 1, 1],
            grid(6),
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .unwrap();
        assert_eq!(instance.cost(2, 3), instance.cost(2, 0));
        assert_eq!(instance.cost(1, 2), 1.0);
    }

    #[test]
    fn small_matrix_is_a_data_error() {
        assert!(Instance::new(
            locations(4),
            &[0, 1, 1, 1],
            grid(3),
            12,
            ZeroDemandPolicy::CoerceToOne,
        )
        .is_err());
    }

    #[test]
    fn records_are_filtered_and_costs_reindexed() {
        let records: Vec<LocationRecord> = serde_json::from_str(
            r#"[
                {"loc_id": 1.0, "title": "Depot", "type": "Warehouse", "long": 0.0, "lat": 0.0},
                {"loc_id": 2.0, "title": "Farm", "type": "Pick-up", "long": 5.0, "lat": 5.0},
                {"loc_id": 3.0, "title": "Pantry", "type": "Agency", "long": 1.0, "lat": 1.0, "zip": "01002"}
            ]"#,
        )
        .unwrap();
        let raw_costs = vec![
            vec![0.0, 10.0, 3.0],
            vec![10.0, 0.0, 7.0],
            vec![4.0, 7.0, 0.0],
        ];
        let config = PlannerConfig::default();

        let instance = Instance::from_records(&records, raw_costs, &[0], &config).unwrap();

        assert_eq!(instance.num_locations(), 2);
        assert_eq!(instance.location(1).id, "3");
        assert_eq!(instance.cost(0, 1), 3.0);
        assert_eq!(instance.cost(1, 0), 4.0);
        assert_eq!(instance.cost(1, 2), 4.0);
        assert_eq!(instance.demand(1), 1);
    }

    #[test]
    fn record_without_coordinates_is_a_data_error() {
        let records: Vec<LocationRecord> = serde_json::from_str(
            r#"[{"loc_id": 1, "type": "Warehouse", "long": 0.0, "lat": 0.0},
                {"loc_id": 2, "type": "Agency", "lat": 1.0}]"#,
        )
        .unwrap();
        let err = Instance::from_records(
            &records,
            vec![vec![0.0; 2]; 2],
            &[3],
            &PlannerConfig::default(),
        )
        .unwrap_err();
        assert!(err.message().contains("coordinates"));
    }
}
