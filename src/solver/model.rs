//! Solver-agnostic CVRP model for one subset.
//!
//! Variables are only materialised for locations of the subset; anything
//! indexed by a location outside it is identically zero. Arcs run from
//! `S \ {D}` to `S \ {O}`, so routes are `O -> .. -> D` paths, not cycles.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::domain::types::Subset;
use crate::error::{ModelError, ModelErrorKind};
use crate::setup::init::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Integer { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRole {
    /// `x[i,j,k]`: route `k` drives from `i` to `j`.
    Edge { from: usize, to: usize, route: usize },
    /// `y[i,k]`: location `i` is served by route `k`.
    Visit { location: usize, route: usize },
    /// `u[i,k]`: load carried by route `k` up to and including `i`.
    Load { location: usize, route: usize },
}

impl fmt::Display for VarRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRole::Edge { from, to, route } => write!(f, "x[{},{},{}]", from, to, route),
            VarRole::Visit { location, route } => write!(f, "y[{},{}]", location, route),
            VarRole::Load { location, route } => write!(f, "u[{},{}]", location, route),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub role: VarRole,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn with(mut self, var: VarId, coefficient: f64) -> Self {
        self.add(var, coefficient);
        self
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|(var, c)| c * values[var.0]).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintFamily {
    Coverage,
    OutDegree,
    InDegree,
    DepotOut,
    DepotIn,
    FlowConservation,
    VisitLink,
    DepotVisit,
    SubtourElimination,
    LoadLower,
    LoadUpper,
    NoSelfLoop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub family: ConstraintFamily,
    pub label: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
        }
    }
}

/// Variable values returned by a solver, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    pub fn set(&mut self, var: VarId, value: f64) {
        self.values[var.0] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct RouteModel {
    subset: Subset,
    route_count: usize,
    capacity: u64,
    demands: HashMap<usize, u64>,
    variables: Vec<Variable>,
    edges: HashMap<(usize, usize, usize), VarId>,
    visits: HashMap<(usize, usize), VarId>,
    loads: HashMap<(usize, usize), VarId>,
    objective: LinearExpr,
    constraints: Vec<Constraint>,
}

impl RouteModel {
    pub fn subset(&self) -> &Subset {
        &self.subset
    }

    pub fn route_count(&self) -> usize {
        self.route_count
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn start(&self) -> usize {
        self.subset.nodes[0]
    }

    pub fn end(&self) -> usize {
        self.subset.nodes[self.subset.nodes.len() - 1]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn edge(&self, from: usize, to: usize, route: usize) -> Option<VarId> {
        self.edges.get(&(from, to, route)).copied()
    }

    pub fn visit(&self, location: usize, route: usize) -> Option<VarId> {
        self.visits.get(&(location, route)).copied()
    }

    pub fn load(&self, location: usize, route: usize) -> Option<VarId> {
        self.loads.get(&(location, route)).copied()
    }

    /// Arcs leaving `from` on `route`, in subset order.
    pub fn successors(&self, from: usize, route: usize) -> Vec<(usize, VarId)> {
        self.subset
            .nodes
            .iter()
            .filter_map(|&to| self.edge(from, to, route).map(|var| (to, var)))
            .collect()
    }

    pub fn count(&self, family: ConstraintFamily) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.family == family)
            .count()
    }

    /// Every constraint the assignment breaks.
    pub fn violations(&self, assignment: &Assignment, tolerance: f64) -> Vec<&Constraint> {
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied(assignment.values(), tolerance))
            .collect()
    }

    /// Encodes known routes (each `[O, .., D]`, one per vehicle slot) as an
    /// assignment. Missing slots become null routes; loads accumulate along each
    /// route and sit at `Q` for locations a route does not visit.
    pub fn encode_routes(&self, routes: &[Vec<usize>]) -> Assignment {
        let mut assignment = Assignment::new(vec![0.0; self.variables.len()]);
        let (o, d) = (self.start(), self.end());
        let q = self.capacity as f64;

        for k in 0..self.route_count {
            let direct = vec![o, d];
            let path = routes.get(k).unwrap_or(&direct);

            for &i in &self.subset.nodes {
                if let Some(var) = self.load(i, k) {
                    let idle = if self.subset.customers().contains(&i) { q } else { 0.0 };
                    assignment.set(var, idle);
                }
            }
            for depot in [o, d] {
                if let Some(var) = self.visit(depot, k) {
                    assignment.set(var, 1.0);
                }
            }

            let mut carried = 0;
            for pair in path.windows(2) {
                if let Some(var) = self.edge(pair[0], pair[1], k) {
                    assignment.set(var, 1.0);
                }
                let stop = pair[1];
                if stop == d {
                    continue;
                }
                carried += self.demands.get(&stop).copied().unwrap_or(0);
                if let Some(var) = self.visit(stop, k) {
                    assignment.set(var, 1.0);
                }
                if let Some(var) = self.load(stop, k) {
                    assignment.set(var, carried as f64);
                }
            }
        }
        assignment
    }
}

/// Builds one [`RouteModel`] per `(subset, K)` over a shared instance.
pub struct RouteModelBuilder<'a> {
    instance: &'a Instance,
}

impl<'a> RouteModelBuilder<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Self { instance }
    }

    pub fn build(&self, subset: &Subset, route_count: usize) -> Result<RouteModel, ModelError> {
        self.check(subset, route_count)?;

        let instance = self.instance;
        let (o, d) = (instance.start_depot(), instance.end_depot());
        let q = instance.capacity();
        let nodes = &subset.nodes;
        let customers = subset.customers();
        let routes = 0..route_count;

        let mut model = RouteModel {
            subset: subset.clone(),
            route_count,
            capacity: q,
            demands: nodes.iter().map(|&i| (i, instance.demand(i))).collect(),
            variables: Vec::new(),
            edges: HashMap::new(),
            visits: HashMap::new(),
            loads: HashMap::new(),
            objective: LinearExpr::new(),
            constraints: Vec::new(),
        };

        // Variables and objective.
        for k in routes.clone() {
            for &i in nodes.iter().filter(|&&i| i != d) {
                for &j in nodes.iter().filter(|&&j| j != o) {
                    let var = model.push_var(
                        VarRole::Edge { from: i, to: j, route: k },
                        VarKind::Binary,
                    );
                    model.edges.insert((i, j, k), var);
                    model.objective.add(var, instance.cost(i, j));
                }
            }
            for &i in nodes {
                let var = model.push_var(VarRole::Visit { location: i, route: k }, VarKind::Binary);
                model.visits.insert((i, k), var);
                let var = model.push_var(
                    VarRole::Load { location: i, route: k },
                    VarKind::Integer {
                        lower: 0.0,
                        upper: q as f64,
                    },
                );
                model.loads.insert((i, k), var);
            }
        }

        for &i in customers {
            let mut coverage = LinearExpr::new();
            let mut out_degree = LinearExpr::new();
            let mut in_degree = LinearExpr::new();
            for k in routes.clone() {
                coverage.add(model.visits[&(i, k)], 1.0);
                for (_, var) in model.successors(i, k) {
                    out_degree.add(var, 1.0);
                }
                for &j in nodes {
                    if let Some(var) = model.edge(j, i, k) {
                        in_degree.add(var, 1.0);
                    }
                }
            }
            model.push(ConstraintFamily::Coverage, format!("cover[{i}]"), coverage, Sense::Eq, 1.0);
            model.push(ConstraintFamily::OutDegree, format!("out[{i}]"), out_degree, Sense::Eq, 1.0);
            model.push(ConstraintFamily::InDegree, format!("in[{i}]"), in_degree, Sense::Eq, 1.0);
        }

        for k in routes.clone() {
            let leave: LinearExpr = LinearExpr {
                terms: model.successors(o, k).into_iter().map(|(_, v)| (v, 1.0)).collect(),
            };
            model.push(ConstraintFamily::DepotOut, format!("leave[{k}]"), leave, Sense::Eq, 1.0);

            let enter = LinearExpr {
                terms: nodes
                    .iter()
                    .filter_map(|&i| model.edge(i, d, k))
                    .map(|v| (v, 1.0))
                    .collect(),
            };
            model.push(ConstraintFamily::DepotIn, format!("enter[{k}]"), enter, Sense::Eq, 1.0);

            for &i in customers {
                let mut flow = LinearExpr::new();
                for &j in nodes {
                    if let Some(var) = model.edge(j, i, k) {
                        flow.add(var, 1.0);
                    }
                    if let Some(var) = model.edge(i, j, k) {
                        flow.add(var, -1.0);
                    }
                }
                model.push(ConstraintFamily::FlowConservation, format!("flow[{i},{k}]"), flow, Sense::Eq, 0.0);

                let mut link = LinearExpr::new().with(model.visits[&(i, k)], 1.0);
                for (_, var) in model.successors(i, k) {
                    link.add(var, -1.0);
                }
                model.push(ConstraintFamily::VisitLink, format!("link[{i},{k}]"), link, Sense::Eq, 0.0);
            }

            for depot in [o, d] {
                let expr = LinearExpr::new().with(model.visits[&(depot, k)], 1.0);
                model.push(ConstraintFamily::DepotVisit, format!("touch[{depot},{k}]"), expr, Sense::Eq, 1.0);
            }

            // Miller-Tucker-Zemlin: u[j] >= u[i] + demand[j] whenever i -> j is driven.
            for &i in customers {
                for &j in customers.iter().filter(|&&j| j != i) {
                    let expr = LinearExpr::new()
                        .with(model.loads[&(i, k)], 1.0)
                        .with(model.loads[&(j, k)], -1.0)
                        .with(model.edges[&(i, j, k)], q as f64);
                    let rhs = q as f64 - instance.demand(j) as f64;
                    model.push(ConstraintFamily::SubtourElimination, format!("mtz[{i},{j},{k}]"), expr, Sense::Le, rhs);
                }
            }

            for &i in nodes {
                let load = model.loads[&(i, k)];
                model.push(
                    ConstraintFamily::LoadLower,
                    format!("load_min[{i},{k}]"),
                    LinearExpr::new().with(load, 1.0),
                    Sense::Ge,
                    instance.demand(i) as f64,
                );
                model.push(
                    ConstraintFamily::LoadUpper,
                    format!("load_max[{i},{k}]"),
                    LinearExpr::new().with(load, 1.0),
                    Sense::Le,
                    q as f64,
                );
            }

            for &i in customers {
                let expr = LinearExpr::new().with(model.edges[&(i, i, k)], 1.0);
                model.push(ConstraintFamily::NoSelfLoop, format!("no_loop[{i},{k}]"), expr, Sense::Eq, 0.0);
            }
        }

        debug!(
            "Subset {}: built model with {} variables and {} constraints (K = {})",
            subset.id,
            model.variables.len(),
            model.constraints.len(),
            route_count
        );
        Ok(model)
    }

    fn check(&self, subset: &Subset, route_count: usize) -> Result<(), ModelError> {
        if route_count < 1 {
            return Err(ModelError::new(subset.id, ModelErrorKind::NoRoutes));
        }
        if subset.len() < 2 {
            return Err(ModelError::new(
                subset.id,
                ModelErrorKind::DegenerateSubset { len: subset.len() },
            ));
        }
        if let Some(&location) = subset.nodes.iter().find(|&&i| !self.instance.contains(i)) {
            return Err(ModelError::new(
                subset.id,
                ModelErrorKind::UnknownLocation { location },
            ));
        }
        let wrapped = subset.start() == Some(self.instance.start_depot())
            && subset.end() == Some(self.instance.end_depot());
        let interior_clean = subset
            .customers()
            .iter()
            .all(|&i| !self.instance.is_depot(i));
        if !wrapped || !interior_clean {
            return Err(ModelError::new(subset.id, ModelErrorKind::MisplacedDepot));
        }
        Ok(())
    }
}

impl RouteModel {
    fn push_var(&mut self, role: VarRole, kind: VarKind) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable { role, kind });
        id
    }

    fn push(&mut self, family: ConstraintFamily, label: String, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            family,
            label,
            expr,
            sense,
            rhs,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroDemandPolicy;
    use crate::domain::types::Location;

    // Depot plus three customers with demands 5, 7, 4 on a line.
    fn instance() -> Instance {
        let locations = (0..4)
            .map(|i| Location::new(format!("L{i}"), "Agency", i as f64, 0.0))
            .collect();
        let costs = (0..4)
            .map(|i| (0..4).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        Instance::new(locations, &[0, 5, 7, 4], costs, 12, ZeroDemandPolicy::CoerceToOne).unwrap()
    }

    fn full_subset(instance: &Instance) -> Subset {
        let customers: Vec<usize> = instance.customers().collect();
        Subset::new(0, instance.start_depot(), &customers, instance.end_depot())
    }

    #[test]
    fn rejects_zero_routes() {
        let instance = instance();
        let err = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 0)
            .unwrap_err();
        assert_eq!(err.kind(), &ModelErrorKind::NoRoutes);
    }

    #[test]
    fn rejects_degenerate_subset() {
        let instance = instance();
        let subset = Subset { id: 4, nodes: vec![0] };
        let err = RouteModelBuilder::new(&instance).build(&subset, 2).unwrap_err();
        assert_eq!(err.kind(), &ModelErrorKind::DegenerateSubset { len: 1 });
        assert_eq!(err.subset(), 4);
    }

    #[test]
    fn rejects_subset_without_depot_copies() {
        let instance = instance();
        let subset = Subset { id: 1, nodes: vec![1, 2, 4] };
        let err = RouteModelBuilder::new(&instance).build(&subset, 1).unwrap_err();
        assert_eq!(err.kind(), &ModelErrorKind::MisplacedDepot);

        let subset = Subset { id: 1, nodes: vec![0, 9, 4] };
        let err = RouteModelBuilder::new(&instance).build(&subset, 1).unwrap_err();
        assert_eq!(err.kind(), &ModelErrorKind::UnknownLocation { location: 9 });
    }

    #[test]
    fn variable_and_constraint_counts() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 2)
            .unwrap();

        // 5 nodes: arcs from 4 sources to 4 targets, per route.
        let edges = model
            .variables()
            .iter()
            .filter(|v| matches!(v.role, VarRole::Edge { .. }))
            .count();
        assert_eq!(edges, 4 * 4 * 2);
        assert_eq!(model.variables().len(), 32 + 5 * 2 * 2);

        assert_eq!(model.count(ConstraintFamily::Coverage), 3);
        assert_eq!(model.count(ConstraintFamily::OutDegree), 3);
        assert_eq!(model.count(ConstraintFamily::InDegree), 3);
        assert_eq!(model.count(ConstraintFamily::DepotOut), 2);
        assert_eq!(model.count(ConstraintFamily::DepotIn), 2);
        assert_eq!(model.count(ConstraintFamily::FlowConservation), 6);
        assert_eq!(model.count(ConstraintFamily::VisitLink), 6);
        assert_eq!(model.count(ConstraintFamily::DepotVisit), 4);
        assert_eq!(model.count(ConstraintFamily::SubtourElimination), 3 * 2 * 2);
        assert_eq!(model.count(ConstraintFamily::LoadLower), 10);
        assert_eq!(model.count(ConstraintFamily::LoadUpper), 10);
        assert_eq!(model.count(ConstraintFamily::NoSelfLoop), 6);
    }

    #[test]
    fn no_arcs_into_start_or_out_of_end() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 1)
            .unwrap();
        for &i in &[0, 1, 2, 3, 4] {
            assert!(model.edge(i, 0, 0).is_none());
            assert!(model.edge(4, i, 0).is_none());
        }
        assert!(model.edge(0, 4, 0).is_some());
    }

    #[test]
    fn objective_uses_end_depot_costs() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 1)
            .unwrap();
        let var = model.edge(3, 4, 0).unwrap();
        let coefficient = model
            .objective()
            .terms
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, c)| *c);
        assert_eq!(coefficient, Some(3.0));
    }

    #[test]
    fn feasible_routes_satisfy_every_constraint() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 3)
            .unwrap();
        let assignment = model.encode_routes(&[vec![0, 1, 3, 4], vec![0, 2, 4]]);

        let violated: Vec<&str> = model
            .violations(&assignment, 1e-9)
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert!(violated.is_empty(), "violated: {:?}", violated);
        // 0->1->3->D costs 1 + 2 + 3, 0->2->D costs 2 + 2, the null route 0.
        assert_eq!(model.objective().evaluate(assignment.values()), 10.0);
    }

    #[test]
    fn subtour_is_rejected_by_mtz() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 2)
            .unwrap();
        // Route 0 serves 3 alone; route 1 is null but carries the cycle 1 -> 2 -> 1.
        let mut assignment = model.encode_routes(&[vec![0, 3, 4]]);
        for (from, to) in [(1, 2), (2, 1)] {
            assignment.set(model.edge(from, to, 1).unwrap(), 1.0);
        }
        for i in [1, 2] {
            assignment.set(model.visit(i, 1).unwrap(), 1.0);
        }

        let violations = model.violations(&assignment, 1e-9);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .all(|c| c.family == ConstraintFamily::SubtourElimination));
    }

    #[test]
    fn overloaded_route_is_rejected() {
        let instance = instance();
        let model = RouteModelBuilder::new(&instance)
            .build(&full_subset(&instance), 2)
            .unwrap();
        // 5 + 7 + 4 = 16 > 12
        let assignment = model.encode_routes(&[vec![0, 1, 2, 3, 4]]);

        let families: Vec<ConstraintFamily> = model
            .violations(&assignment, 1e-9)
            .iter()
            .map(|c| c.family)
            .collect();
        assert!(families.contains(&ConstraintFamily::LoadUpper));
    }

    #[test]
    fn strict_subset_only_materialises_its_own_variables() {
        let instance = instance();
        let subset = Subset::new(2, 0, &[2], 4);
        let model = RouteModelBuilder::new(&instance).build(&subset, 1).unwrap();

        assert!(model.edge(0, 1, 0).is_none());
        assert!(model.visit(3, 0).is_none());
        assert!(model.load(1, 0).is_none());
        assert!(model.edge(0, 2, 0).is_some());
        assert_eq!(model.successors(2, 0).len(), 2);
    }
}
