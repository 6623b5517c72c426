use crate::domain::solution::Solution;
use crate::domain::types::Route;
use crate::setup::init::Instance;

/// Sum of consecutive edge costs along the route, depot legs included.
pub fn route_cost(route: &Route, instance: &Instance) -> f64 {
    route
        .nodes
        .windows(2)
        .map(|pair| dist_between(pair[0], pair[1], instance))
        .sum()
}

pub fn route_load(route: &Route, instance: &Instance) -> u64 {
    instance.total_demand(route.interior())
}

pub fn solution_cost(solution: &Solution, instance: &Instance) -> f64 {
    solution.routes.iter().map(|r| route_cost(r, instance)).sum()
}

pub fn dist_between(from_loc: usize, to_loc: usize, instance: &Instance) -> f64 {
    instance.cost(from_loc, to_loc)
}
