pub mod extract;
pub mod model;
pub mod oracle;
pub mod pipeline;

pub use extract::RouteExtractor;
pub use model::{Assignment, RouteModel, RouteModelBuilder};
pub use oracle::{MicroLpOracle, SolveOutcome, SolverOracle};
pub use pipeline::{Plan, Planner, SubsetOutcome, SubsetStatus};
