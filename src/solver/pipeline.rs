use std::fmt;

use rayon::prelude::*;
use tracing::{debug, info, span, warn, Level};

use crate::config::PlannerConfig;
use crate::domain::solution::Solution;
use crate::domain::types::{Route, Subset};
use crate::error::{ModelError, PlanError};
use crate::partition::{ClusteringOracle, Partitioner};
use crate::setup::init::Instance;
use crate::solver::extract::RouteExtractor;
use crate::solver::model::RouteModelBuilder;
use crate::solver::oracle::{SolveOutcome, SolverOracle};
use crate::utils::ceil_div;

#[derive(Debug, Clone, PartialEq)]
pub enum SubsetStatus {
    Solved { objective: f64 },
    Infeasible,
    Timeout,
    Failed(ModelError),
}

impl SubsetStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, SubsetStatus::Solved { .. })
    }
}

impl fmt::Display for SubsetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsetStatus::Solved { objective } => write!(f, "solved (cost {:.2})", objective),
            SubsetStatus::Infeasible => write!(f, "infeasible"),
            SubsetStatus::Timeout => write!(f, "timed out"),
            SubsetStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Final state of one subset after all route-count attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetOutcome {
    pub subset: Subset,
    pub demand: u64,
    pub route_count: usize,
    pub attempts: usize,
    pub status: SubsetStatus,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub outcomes: Vec<SubsetOutcome>,
    pub solution: Solution,
}

impl Plan {
    /// True when every subset produced routes. Anything else leaves locations unserved.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_solved())
    }

    pub fn unsolved(&self) -> impl Iterator<Item = &SubsetOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_solved())
    }
}

/// Smallest fleet that can carry `demand`, plus `slack`, never more vehicles than
/// stops and never fewer than one.
pub fn initial_route_count(demand: u64, capacity: u64, customers: usize, slack: usize) -> usize {
    let needed = ceil_div(demand, capacity) as usize + slack;
    needed.min(customers).max(1)
}

/// Partition, per-subset build/solve/extract, then merge in subset order.
pub struct Planner<'a> {
    instance: &'a Instance,
    config: &'a PlannerConfig,
    clustering: &'a dyn ClusteringOracle,
    solver: &'a dyn SolverOracle,
}

impl<'a> Planner<'a> {
    pub fn new(
        instance: &'a Instance,
        config: &'a PlannerConfig,
        clustering: &'a dyn ClusteringOracle,
        solver: &'a dyn SolverOracle,
    ) -> Self {
        Self {
            instance,
            config,
            clustering,
            solver,
        }
    }

    pub fn plan(&self) -> Result<Plan, PlanError> {
        self.config.check()?;
        let subsets = Partitioner::new(self.clustering, self.config).partition(self.instance)?;
        let outcomes = self.solve_all(&subsets)?;

        let mut solution = Solution::new();
        for outcome in &outcomes {
            solution.extend(outcome.routes.iter().cloned());
        }

        let plan = Plan { outcomes, solution };
        if plan.is_complete() {
            info!("All {} subsets solved, {} routes", plan.outcomes.len(), plan.solution.len());
        } else {
            warn!(
                "{} of {} subsets left unsolved",
                plan.unsolved().count(),
                plan.outcomes.len()
            );
        }
        Ok(plan)
    }

    /// Results come back in subset order whether or not they were computed in parallel.
    pub fn solve_all(&self, subsets: &[Subset]) -> Result<Vec<SubsetOutcome>, PlanError> {
        if self.config.parallel {
            subsets
                .par_iter()
                .map(|subset| self.solve_subset(subset))
                .collect()
        } else {
            subsets.iter().map(|subset| self.solve_subset(subset)).collect()
        }
    }

    /// Solves one subset, raising the route count after each infeasible attempt.
    pub fn solve_subset(&self, subset: &Subset) -> Result<SubsetOutcome, PlanError> {
        let span = span!(Level::INFO, "subset", id = subset.id);
        let _guard = span.enter();

        let customers = subset.customers().len();
        let demand = self.instance.total_demand(subset.customers());
        let ceiling = customers.max(1);
        let step = self.config.route_slack.max(1);
        let mut route_count =
            initial_route_count(demand, self.instance.capacity(), customers, self.config.route_slack);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let (status, routes) = match self.solve_with_route_count(subset, demand, route_count) {
                Ok(result) => result,
                Err(PlanError::Model(err)) => {
                    warn!("{}", err);
                    (SubsetStatus::Failed(err), Vec::new())
                }
                Err(err) => return Err(err),
            };

            let retry = status == SubsetStatus::Infeasible
                && attempts <= self.config.max_retries
                && route_count < ceiling;
            if retry {
                let next = (route_count + step).min(ceiling);
                info!(
                    "Subset {} infeasible with K = {}, retrying with K = {}",
                    subset.id, route_count, next
                );
                route_count = next;
                continue;
            }

            info!(
                "Subset {} ({} locations, {} pallets): {} after {} attempt(s)",
                subset.id, customers, demand, status, attempts
            );
            return Ok(SubsetOutcome {
                subset: subset.clone(),
                demand,
                route_count,
                attempts,
                status,
                routes,
            });
        }
    }

    fn solve_with_route_count(
        &self,
        subset: &Subset,
        demand: u64,
        route_count: usize,
    ) -> Result<(SubsetStatus, Vec<Route>), PlanError> {
        let model = RouteModelBuilder::new(self.instance).build(subset, route_count)?;

        let fleet_capacity = route_count as u64 * self.instance.capacity();
        if demand > fleet_capacity {
            debug!(
                "Subset {}: {} pallets exceed {} routes x {}",
                subset.id,
                demand,
                route_count,
                self.instance.capacity()
            );
            return Ok((SubsetStatus::Infeasible, Vec::new()));
        }

        match self.solver.solve(&model)? {
            SolveOutcome::Optimal(assignment) => {
                let broken = model.violations(&assignment, self.config.tolerance);
                for c in &broken {
                    debug!("Subset {}: solver output violates {}", subset.id, c.label);
                }
                let routes = RouteExtractor::new(self.config.tolerance).extract(&model, &assignment)?;
                let objective = model.objective().evaluate(assignment.values());
                Ok((SubsetStatus::Solved { objective }, routes))
            }
            SolveOutcome::Infeasible => Ok((SubsetStatus::Infeasible, Vec::new())),
            SolveOutcome::Timeout => Ok((SubsetStatus::Timeout, Vec::new())),
        }
    }
}
