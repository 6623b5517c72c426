use std::collections::HashSet;

use tracing::trace;

use crate::domain::types::Route;
use crate::error::{ReconstructionError, ReconstructionErrorKind};
use crate::solver::model::{Assignment, RouteModel, VarId};

/// Walks the selected edges of an assignment into ordered `O -> .. -> D` routes.
#[derive(Debug, Clone)]
pub struct RouteExtractor {
    tolerance: f64,
}

impl RouteExtractor {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// One route per vehicle slot, null routes dropped. Pure: the same input
    /// always yields the same routes in the same order.
    pub fn extract(
        &self,
        model: &RouteModel,
        assignment: &Assignment,
    ) -> Result<Vec<Route>, ReconstructionError> {
        let mut routes = Vec::new();
        for k in 0..model.route_count() {
            let path = self.walk(model, assignment, k)?;
            trace!("Subset {} route {}: {:?}", model.subset().id, k, path);
            let route = Route::new(model.subset().id, k, path);
            if !route.is_null() {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    fn walk(
        &self,
        model: &RouteModel,
        assignment: &Assignment,
        route: usize,
    ) -> Result<Vec<usize>, ReconstructionError> {
        let (start, end) = (model.start(), model.end());
        let error = |node, kind| ReconstructionError::new(model.subset().id, route, node, kind);

        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        let mut current = start;
        while current != end {
            let mut chosen = Vec::new();
            for (to, var) in model.successors(current, route) {
                if self.selected(model, assignment, var).map_err(|kind| error(current, kind))? {
                    chosen.push(to);
                }
            }

            let next = match chosen.as_slice() {
                [] => return Err(error(current, ReconstructionErrorKind::NoOutgoingEdge)),
                [next] => *next,
                _ => {
                    return Err(error(
                        current,
                        ReconstructionErrorKind::MultipleOutgoingEdges { successors: chosen },
                    ))
                }
            };
            if !visited.insert(next) {
                return Err(error(next, ReconstructionErrorKind::Revisited));
            }
            path.push(next);
            current = next;
        }
        Ok(path)
    }

    fn selected(
        &self,
        model: &RouteModel,
        assignment: &Assignment,
        var: VarId,
    ) -> Result<bool, ReconstructionErrorKind> {
        let value = assignment.value(var);
        if (value - 1.0).abs() <= self.tolerance {
            Ok(true)
        } else if value.abs() <= self.tolerance {
            Ok(false)
        } else {
            Err(ReconstructionErrorKind::FractionalValue {
                variable: model.variable(var).role.to_string(),
                value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroDemandPolicy;
    use crate::domain::types::{Location, Subset};
    use crate::setup::init::Instance;
    use crate::solver::model::RouteModelBuilder;

    fn model(route_count: usize) -> RouteModel {
        let locations = (0..4)
            .map(|i| Location::new(format!("L{i}"), "Agency", i as f64, 0.0))
            .collect();
        let costs = (0..4)
            .map(|i| (0..4).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        let instance =
            Instance::new(locations, &[0, 5, 7, 4], costs, 12, ZeroDemandPolicy::CoerceToOne).unwrap();
        let subset = Subset::new(0, 0, &[1, 2, 3], 4);
        RouteModelBuilder::new(&instance).build(&subset, route_count).unwrap()
    }

    #[test]
    fn recovers_routes_and_drops_null_slots() {
        let model = model(3);
        let assignment = model.encode_routes(&[vec![0, 3, 1, 4], vec![0, 4], vec![0, 2, 4]]);

        let routes = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap();
        assert_eq!(
            routes,
            vec![Route::new(0, 0, vec![0, 3, 1, 4]), Route::new(0, 2, vec![0, 2, 4])]
        );
    }

    #[test]
    fn extraction_is_repeatable() {
        let model = model(2);
        let assignment = model.encode_routes(&[vec![0, 2, 1, 4], vec![0, 3, 4]]);
        let extractor = RouteExtractor::new(1e-6);

        assert_eq!(
            extractor.extract(&model, &assignment).unwrap(),
            extractor.extract(&model, &assignment).unwrap()
        );
    }

    #[test]
    fn near_integral_values_are_accepted() {
        let model = model(1);
        let mut assignment = model.encode_routes(&[vec![0, 1, 2, 3, 4]]);
        assignment.set(model.edge(0, 1, 0).unwrap(), 1.0 - 1e-9);
        assignment.set(model.edge(0, 2, 0).unwrap(), 1e-9);

        let routes = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap();
        assert_eq!(routes[0].nodes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn missing_outgoing_edge_is_reported() {
        let model = model(1);
        let mut assignment = model.encode_routes(&[vec![0, 1, 4]]);
        assignment.set(model.edge(1, 4, 0).unwrap(), 0.0);

        let err = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap_err();
        assert_eq!(err.kind(), &ReconstructionErrorKind::NoOutgoingEdge);
        assert_eq!((err.route(), err.node()), (0, 1));
    }

    #[test]
    fn branching_is_reported() {
        let model = model(1);
        let mut assignment = model.encode_routes(&[vec![0, 1, 4]]);
        assignment.set(model.edge(0, 2, 0).unwrap(), 1.0);

        let err = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap_err();
        assert_eq!(
            err.kind(),
            &ReconstructionErrorKind::MultipleOutgoingEdges { successors: vec![1, 2] }
        );
        assert_eq!(err.node(), 0);
    }

    #[test]
    fn fractional_edge_names_the_variable() {
        let model = model(1);
        let mut assignment = model.encode_routes(&[vec![0, 1, 4]]);
        assignment.set(model.edge(0, 1, 0).unwrap(), 0.5);

        let err = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap_err();
        assert_eq!(
            err.kind(),
            &ReconstructionErrorKind::FractionalValue {
                variable: "x[0,1,0]".to_string(),
                value: 0.5
            }
        );
    }

    #[test]
    fn cycle_is_reported_as_revisit() {
        let model = model(1);
        let mut assignment = model.encode_routes(&[vec![0, 1, 2, 4]]);
        assignment.set(model.edge(2, 4, 0).unwrap(), 0.0);
        assignment.set(model.edge(2, 1, 0).unwrap(), 1.0);

        let err = RouteExtractor::new(1e-6).extract(&model, &assignment).unwrap_err();
        assert_eq!(err.kind(), &ReconstructionErrorKind::Revisited);
        assert_eq!(err.node(), 1);
    }
}
