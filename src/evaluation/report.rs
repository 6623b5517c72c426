use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;

use crate::domain::solution::Solution;
use crate::error::DataError;
use crate::evaluation::fitness::{route_cost, route_load, solution_cost};
use crate::setup::init::Instance;
use crate::solver::pipeline::SubsetOutcome;
use crate::utils::format_path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub route: usize,
    pub subset: usize,
    pub vehicle: usize,
    pub locations_served: usize,
    pub pallets_delivered: u64,
    pub cost: f64,
    pub path: String,
    pub nodes: Vec<usize>,
}

impl RouteSummary {
    /// `locations | pallets | O -> .. -> D`
    pub fn line(&self) -> String {
        format!(
            "{} | {} | {}",
            self.locations_served, self.pallets_delivered, self.path
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetSummary {
    pub subset: usize,
    pub locations: usize,
    pub pallets: u64,
    pub route_count: usize,
    pub attempts: usize,
    pub status: String,
}

impl From<&SubsetOutcome> for SubsetSummary {
    fn from(outcome: &SubsetOutcome) -> Self {
        Self {
            subset: outcome.subset.id,
            locations: outcome.subset.customers().len(),
            pallets: outcome.demand,
            route_count: outcome.route_count,
            attempts: outcome.attempts,
            status: outcome.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub route_count: usize,
    pub total_cost: f64,
    pub total_pallets: u64,
    pub locations_covered: usize,
    /// Shortest routes first; ties keep solution order.
    pub routes: Vec<RouteSummary>,
    pub subsets: Vec<SubsetSummary>,
}

impl Report {
    pub fn new(solution: &Solution, instance: &Instance) -> Self {
        let mut routes: Vec<RouteSummary> = solution
            .routes
            .iter()
            .map(|r| RouteSummary {
                route: 0,
                subset: r.subset,
                vehicle: r.vehicle,
                locations_served: r.interior().len(),
                pallets_delivered: route_load(r, instance),
                cost: route_cost(r, instance),
                path: format_path(&r.nodes),
                nodes: r.nodes.clone(),
            })
            .collect();
        routes.sort_by_key(|r| r.locations_served);
        for (rank, summary) in routes.iter_mut().enumerate() {
            summary.route = rank + 1;
        }

        Self {
            generated_at: Utc::now(),
            route_count: routes.len(),
            total_cost: solution_cost(solution, instance),
            total_pallets: routes.iter().map(|r| r.pallets_delivered).sum(),
            locations_covered: solution.served().count(),
            routes,
            subsets: Vec::new(),
        }
    }

    pub fn with_subsets(mut self, outcomes: &[SubsetOutcome]) -> Self {
        self.subsets = outcomes.iter().map(SubsetSummary::from).collect();
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.routes.iter().map(RouteSummary::line).collect()
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let mut wtr = Writer::from_path(path)?;
        wtr.write_record(["route", "locations_served", "pallets_delivered", "cost", "path"])?;
        for r in &self.routes {
            wtr.write_record([
                r.route.to_string(),
                r.locations_served.to_string(),
                r.pallets_delivered.to_string(),
                format!("{:.3}", r.cost),
                r.path.clone(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroDemandPolicy;
    use crate::domain::types::{Location, Route};

    fn report() -> Report {
        let locations = (0..5)
            .map(|i| Location::new(format!("L{i}"), "Agency", i as f64, 0.0))
            .collect();
        let costs = (0..5)
            .map(|i| (0..5).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        let instance =
            Instance::new(locations, &[0, 2, 3, 4, 5], costs, 12, ZeroDemandPolicy::CoerceToOne).unwrap();
        let mut solution = Solution::new();
        solution.extend(vec![
            Route::new(0, 0, vec![0, 1, 3, 5]),
            Route::new(0, 1, vec![0, 4, 5]),
            Route::new(1, 0, vec![0, 2, 5]),
        ]);
        Report::new(&solution, &instance)
    }

    #[test]
    fn routes_sorted_by_length_stably() {
        let report = report();
        let order: Vec<(usize, usize)> = report.routes.iter().map(|r| (r.subset, r.vehicle)).collect();
        assert_eq!(order, vec![(0, 1), (1, 0), (0, 0)]);
        assert_eq!(
            report.routes.iter().map(|r| r.route).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn totals_and_lines() {
        let report = report();
        assert_eq!(report.route_count, 3);
        assert_eq!(report.total_pallets, 14);
        assert_eq!(report.locations_covered, 4);
        // 0->4->0, 0->2->0, 0->1->3->0
        assert_eq!(report.total_cost, 8.0 + 4.0 + 6.0);
        assert_eq!(report.lines()[0], "1 | 5 | O -> 4 -> D");
        assert_eq!(report.lines()[2], "2 | 6 | O -> 1 -> 3 -> D");
    }

    #[test]
    fn writes_csv_and_json() {
        let report = report();
        let dir = std::env::temp_dir().join(format!("cvrp-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join("routes.csv");
        report.write_csv(&csv_path).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("route,locations_served,pallets_delivered,cost,path"));
        assert_eq!(csv.lines().count(), 4);

        let json_path = dir.join("routes.json");
        report.write_json(&json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["route_count"], 3);
        assert!(value["generated_at"].is_string());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
