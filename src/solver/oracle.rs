use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution as _,
    SolverModel, Variable as LpVariable,
};
use tracing::{debug, warn};

use crate::error::PlanError;
use crate::solver::model::{Assignment, RouteModel, Sense, VarId, VarKind};

/// What a solve produced. Infeasible and Timeout are ordinary results, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Infeasible,
    Timeout,
}

/// Black-box MILP engine. Implementations must not mutate the model.
pub trait SolverOracle: Send + Sync {
    fn solve(&self, model: &RouteModel) -> Result<SolveOutcome, PlanError>;
}

/// Branch-and-bound from the pure-Rust `microlp` backend of `good_lp`.
///
/// microlp cannot be interrupted. With a timeout set, each solve runs on its own
/// worker thread; a worker that misses the deadline keeps its CPU until it
/// finishes and its result is dropped. [`MicroLpOracle::running_workers`] counts
/// workers still alive, abandoned ones included.
#[derive(Debug, Clone, Default)]
pub struct MicroLpOracle {
    pub timeout: Option<Duration>,
    workers: Arc<AtomicUsize>,
}

impl MicroLpOracle {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn running_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    fn solve_blocking(model: &RouteModel) -> Result<SolveOutcome, PlanError> {
        let mut vars = ProblemVariables::new();
        let handles: Vec<LpVariable> = model
            .variables()
            .iter()
            .map(|v| match v.kind {
                VarKind::Binary => vars.add(variable().binary().name(v.role.to_string())),
                VarKind::Integer { lower, upper } => vars.add(
                    variable()
                        .integer()
                        .min(lower)
                        .max(upper)
                        .name(v.role.to_string()),
                ),
            })
            .collect();

        let lower = |terms: &[(VarId, f64)]| {
            let mut expr = Expression::with_capacity(terms.len());
            for &(var, coefficient) in terms {
                expr.add_mul(coefficient, handles[var.0]);
            }
            expr
        };

        let mut problem = vars
            .minimise(lower(&model.objective().terms))
            .using(microlp);
        for c in model.constraints() {
            let expr = lower(&c.expr.terms);
            let row = match c.sense {
                Sense::Eq => constraint::eq(expr, c.rhs),
                Sense::Le => constraint::leq(expr, c.rhs),
                Sense::Ge => constraint::geq(expr, c.rhs),
            };
            problem.add_constraint(row);
        }

        match problem.solve() {
            Ok(solution) => {
                let values = handles.iter().map(|&h| solution.value(h)).collect();
                Ok(SolveOutcome::Optimal(Assignment::new(values)))
            }
            Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
            Err(err) => Err(PlanError::Solver {
                subset: model.subset().id,
                message: err.to_string(),
            }),
        }
    }
}

impl SolverOracle for MicroLpOracle {
    fn solve(&self, model: &RouteModel) -> Result<SolveOutcome, PlanError> {
        let started = Instant::now();
        let outcome = match self.timeout {
            None => Self::solve_blocking(model)?,
            Some(limit) => {
                let (tx, rx) = mpsc::channel();
                let owned = model.clone();
                let workers = Arc::clone(&self.workers);
                workers.fetch_add(1, Ordering::SeqCst);
                thread::spawn(move || {
                    let result = Self::solve_blocking(&owned);
                    workers.fetch_sub(1, Ordering::SeqCst);
                    let _ = tx.send(result);
                });
                match rx.recv_timeout(limit) {
                    Ok(result) => result?,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        warn!(
                            "Subset {}: no solution within {:?}, abandoning its worker ({} solver worker(s) still running)",
                            model.subset().id,
                            limit,
                            self.running_workers()
                        );
                        SolveOutcome::Timeout
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        return Err(PlanError::Solver {
                            subset: model.subset().id,
                            message: "solver worker exited without a result".to_string(),
                        })
                    }
                }
            }
        };
        debug!(
            "Subset {}: microlp finished in {:.2?} ({})",
            model.subset().id,
            started.elapsed(),
            match &outcome {
                SolveOutcome::Optimal(_) => "optimal",
                SolveOutcome::Infeasible => "infeasible",
                SolveOutcome::Timeout => "timeout",
            }
        );
        Ok(outcome)
    }
}
