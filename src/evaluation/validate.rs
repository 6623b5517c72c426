use std::collections::BTreeMap;

use tracing::{info, span, Level};

use crate::domain::solution::Solution;
use crate::error::ValidationError;
use crate::evaluation::fitness::route_load;
use crate::evaluation::report::Report;
use crate::setup::init::Instance;

/// Checks route shape, coverage and capacity, then builds the report.
/// Nothing is repaired: the first broken invariant is returned as is.
pub fn validate(solution: &Solution, instance: &Instance) -> Result<Report, ValidationError> {
    let span = span!(Level::INFO, "validate", routes = solution.len());
    let _guard = span.enter();

    for (position, route) in solution.routes.iter().enumerate() {
        check_shape(position, &route.nodes, instance)?;
    }

    let mut served_by: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (position, route) in solution.routes.iter().enumerate() {
        for &stop in route.interior() {
            served_by.entry(stop).or_default().push(position);
        }
    }
    if let Some((&location, routes)) = served_by.iter().find(|(_, routes)| routes.len() > 1) {
        return Err(ValidationError::Duplicated {
            location,
            routes: routes.clone(),
        });
    }
    if let Some(location) = instance.customers().find(|i| !served_by.contains_key(i)) {
        return Err(ValidationError::Uncovered { location });
    }

    for (position, route) in solution.routes.iter().enumerate() {
        let load = route_load(route, instance);
        if load > instance.capacity() {
            return Err(ValidationError::OverCapacity {
                route: position,
                load,
                capacity: instance.capacity(),
            });
        }
    }

    info!(
        "Solution valid: {} routes cover all {} locations",
        solution.len(),
        instance.customers().len()
    );
    Ok(Report::new(solution, instance))
}

fn check_shape(position: usize, nodes: &[usize], instance: &Instance) -> Result<(), ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedRoute {
        route: position,
        reason,
    };

    if nodes.len() < 2 {
        return Err(malformed(format!("only {} stops", nodes.len())));
    }
    if nodes[0] != instance.start_depot() || nodes[nodes.len() - 1] != instance.end_depot() {
        return Err(malformed("does not run from the start depot to the end depot".to_string()));
    }
    for &stop in &nodes[1..nodes.len() - 1] {
        if !instance.contains(stop) {
            return Err(malformed(format!("unknown location {stop}")));
        }
        if instance.is_depot(stop) {
            return Err(malformed("passes through a depot copy".to_string()));
        }
    }
    Ok(())
}
