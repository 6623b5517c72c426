use std::fmt;

/// Malformed or inconsistent input. Fatal: raised before any model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct DataError {
    message: String,
}

impl DataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data error: {}", self.message)
    }
}

impl std::error::Error for DataError {}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::new(format!("i/o failure: {err}"))
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::new(format!("invalid json: {err}"))
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::new(format!("invalid csv: {err}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelErrorKind {
    NoRoutes,
    DegenerateSubset { len: usize },
    UnknownLocation { location: usize },
    MisplacedDepot,
}

/// Invalid parameters for one route model. Fatal for that subset only.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelError {
    subset: usize,
    kind: ModelErrorKind,
}

impl ModelError {
    pub fn new(subset: usize, kind: ModelErrorKind) -> Self {
        Self { subset, kind }
    }

    pub fn subset(&self) -> usize {
        self.subset
    }

    pub fn kind(&self) -> &ModelErrorKind {
        &self.kind
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ModelErrorKind::NoRoutes => {
                write!(f, "subset {}: route count must be at least 1", self.subset)
            }
            ModelErrorKind::DegenerateSubset { len } => write!(
                f,
                "subset {}: needs both depot copies, got {} entries",
                self.subset, len
            ),
            ModelErrorKind::UnknownLocation { location } => write!(
                f,
                "subset {}: location {} is not part of the instance",
                self.subset, location
            ),
            ModelErrorKind::MisplacedDepot => write!(
                f,
                "subset {}: must start at the start depot, end at the end depot and hold no other depot copy",
                self.subset
            ),
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionErrorKind {
    NoOutgoingEdge,
    MultipleOutgoingEdges { successors: Vec<usize> },
    FractionalValue { variable: String, value: f64 },
    Revisited,
}

/// The assignment disagrees with the graph structure of its model.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionError {
    subset: usize,
    route: usize,
    node: usize,
    kind: ReconstructionErrorKind,
}

impl ReconstructionError {
    pub fn new(subset: usize, route: usize, node: usize, kind: ReconstructionErrorKind) -> Self {
        Self {
            subset,
            route,
            node,
            kind,
        }
    }

    pub fn subset(&self) -> usize {
        self.subset
    }

    pub fn route(&self) -> usize {
        self.route
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn kind(&self) -> &ReconstructionErrorKind {
        &self.kind
    }
}

impl fmt::Display for ReconstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subset {}, route {}, node {}: ",
            self.subset, self.route, self.node
        )?;
        match &self.kind {
            ReconstructionErrorKind::NoOutgoingEdge => write!(f, "no selected outgoing edge"),
            ReconstructionErrorKind::MultipleOutgoingEdges { successors } => {
                write!(f, "several selected outgoing edges to {:?}", successors)
            }
            ReconstructionErrorKind::FractionalValue { variable, value } => {
                write!(f, "{} has non-integral value {}", variable, value)
            }
            ReconstructionErrorKind::Revisited => write!(f, "node reached twice on one route"),
        }
    }
}

impl std::error::Error for ReconstructionError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Uncovered {
        location: usize,
    },
    Duplicated {
        location: usize,
        routes: Vec<usize>,
    },
    OverCapacity {
        route: usize,
        load: u64,
        capacity: u64,
    },
    MalformedRoute {
        route: usize,
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Uncovered { location } => {
                write!(f, "coverage: location {} is on no route", location)
            }
            ValidationError::Duplicated { location, routes } => write!(
                f,
                "coverage: location {} is served more than once (routes {:?})",
                location, routes
            ),
            ValidationError::OverCapacity {
                route,
                load,
                capacity,
            } => write!(
                f,
                "capacity: route {} carries {} pallets, limit is {}",
                route, load, capacity
            ),
            ValidationError::MalformedRoute { route, reason } => {
                write!(f, "route {} is malformed: {}", route, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    Data(DataError),
    Model(ModelError),
    Reconstruction(ReconstructionError),
    Validation(ValidationError),
    Clustering(String),
    Solver { subset: usize, message: String },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Data(err) => write!(f, "{}", err),
            PlanError::Model(err) => write!(f, "model error: {}", err),
            PlanError::Reconstruction(err) => write!(f, "reconstruction error: {}", err),
            PlanError::Validation(err) => write!(f, "validation error: {}", err),
            PlanError::Clustering(msg) => write!(f, "clustering failed: {}", msg),
            PlanError::Solver { subset, message } => {
                write!(f, "solver failed on subset {}: {}", subset, message)
            }
        }
    }
}

impl std::error::Error for PlanError {}

impl From<DataError> for PlanError {
    fn from(err: DataError) -> Self {
        PlanError::Data(err)
    }
}

impl From<ModelError> for PlanError {
    fn from(err: ModelError) -> Self {
        PlanError::Model(err)
    }
}

impl From<ReconstructionError> for PlanError {
    fn from(err: ReconstructionError) -> Self {
        PlanError::Reconstruction(err)
    }
}

impl From<ValidationError> for PlanError {
    fn from(err: ValidationError) -> Self {
        PlanError::Validation(err)
    }
}
