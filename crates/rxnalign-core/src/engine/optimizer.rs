//! Equality-constrained minimization with box bounds.
//!
//! The solver is an augmented Lagrangian method: an outer loop updates the multiplier estimates
//! `lambda <- lambda + mu * c(x)` and grows the penalty `mu` whenever the constraint residual
//! stalls, while an inner BFGS solve (Armijo backtracking, restarted from the identity whenever
//! it breaks down) minimizes `L(x) = f(x) + lambda . c(x) + mu / 2 |c(x)|^2` over the box.
//! An inner solve only counts as stationary when the projected gradient of `L` is small.

use super::config::AlignmentConfig;
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient};
use argmin::solver::linesearch::{BacktrackingLineSearch, condition::ArmijoCondition};
use argmin::solver::quasinewton::BFGS;
use argmin_math::ArgminEye;
use nalgebra::{DMatrix, DVector};
use std::cell::RefCell;
use tracing::{instrument, trace};

const FINITE_DIFFERENCE_STEP: f64 = 1e-6;
const ARMIJO_FRACTION: f64 = 1e-4;
const BACKTRACKING_FACTOR: f64 = 0.5;
const BOUND_PENALTY: f64 = 1e4;

/// Closed interval a single variable is confined to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub const FREE: Bound = Bound {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub fn symmetric(limit: f64) -> Self {
        Self {
            lower: -limit,
            upper: limit,
        }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// A smooth objective with equality constraints `c(x) = 0` and per-variable bounds.
///
/// Only the objective and constraint values are required; gradients and Jacobians default to
/// central finite differences and should be overridden when analytic forms are available.
pub trait ConstrainedProblem {
    fn dimension(&self) -> usize;

    fn num_constraints(&self) -> usize;

    fn objective(&self, x: &DVector<f64>) -> f64;

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        finite_difference_gradient(|p| self.objective(p), x)
    }

    fn constraints(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of the constraints, one row per constraint.
    fn constraint_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        finite_difference_jacobian(|p| self.constraints(p), x, self.num_constraints())
    }

    fn bounds(&self) -> Vec<Bound> {
        vec![Bound::FREE; self.dimension()]
    }
}

pub fn finite_difference_gradient<F>(f: F, x: &DVector<f64>) -> DVector<f64>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let mut gradient = DVector::zeros(x.len());
    let mut point = x.clone();
    for i in 0..x.len() {
        let h = FINITE_DIFFERENCE_STEP * x[i].abs().max(1.0);
        point[i] = x[i] + h;
        let forward = f(&point);
        point[i] = x[i] - h;
        let backward = f(&point);
        point[i] = x[i];
        gradient[i] = (forward - backward) / (2.0 * h);
    }
    gradient
}

pub fn finite_difference_jacobian<F>(c: F, x: &DVector<f64>, num_constraints: usize) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jacobian = DMatrix::zeros(num_constraints, x.len());
    let mut point = x.clone();
    for i in 0..x.len() {
        let h = FINITE_DIFFERENCE_STEP * x[i].abs().max(1.0);
        point[i] = x[i] + h;
        let forward = c(&point);
        point[i] = x[i] - h;
        let backward = c(&point);
        point[i] = x[i];
        jacobian.set_column(i, &((forward - backward) / (2.0 * h)));
    }
    jacobian
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub inner_max_iterations: usize,
    pub objective_tolerance: f64,
    pub gradient_tolerance: f64,
    pub constraint_tolerance: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
    pub max_penalty: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::from(&AlignmentConfig::default())
    }
}

impl From<&AlignmentConfig> for SolverSettings {
    fn from(config: &AlignmentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            inner_max_iterations: config.inner_max_iterations,
            objective_tolerance: config.objective_tolerance,
            gradient_tolerance: config.gradient_tolerance,
            constraint_tolerance: config.constraint_tolerance,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    /// Best feasible point found, or the last iterate if none was feasible.
    pub x: DVector<f64>,
    pub multipliers: DVector<f64>,
    pub objective: f64,
    pub max_constraint_violation: f64,
    /// Outer iterations performed.
    pub iterations: usize,
    pub inner_iterations: usize,
    pub converged: bool,
}

struct InnerResult {
    x: DVector<f64>,
    iterations: usize,
    stationary: bool,
}

/// Lowest clamped point evaluated so far, kept outside the executor so that a run ending in an
/// error still hands back its progress.
struct Incumbent {
    x: DVector<f64>,
    value: f64,
    gradient_evaluations: usize,
}

impl Incumbent {
    fn empty() -> RefCell<Self> {
        RefCell::new(Self {
            x: DVector::zeros(0),
            value: f64::INFINITY,
            gradient_evaluations: 0,
        })
    }
}

/// The augmented Lagrangian of one outer iteration as an unconstrained problem: every point is
/// evaluated at its clamp onto the box, plus a quadratic penalty on the distance to the box.
struct PenaltySubproblem<'a, P: ?Sized> {
    problem: &'a P,
    bounds: &'a [Bound],
    lambda: &'a DVector<f64>,
    mu: f64,
    incumbent: &'a RefCell<Incumbent>,
}

impl<P: ?Sized> Clone for PenaltySubproblem<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized> Copy for PenaltySubproblem<'_, P> {}

impl<'a, P> PenaltySubproblem<'a, P>
where
    P: ConstrainedProblem + ?Sized,
{
    fn new(
        problem: &'a P,
        bounds: &'a [Bound],
        lambda: &'a DVector<f64>,
        mu: f64,
        incumbent: &'a RefCell<Incumbent>,
    ) -> Self {
        Self {
            problem,
            bounds,
            lambda,
            mu,
            incumbent,
        }
    }

    fn clamp<'x>(&self, x: impl IntoIterator<Item = &'x f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.bounds.len(),
            x.into_iter().zip(self.bounds).map(|(&v, b)| b.clamp(v)),
        )
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        let c = self.problem.constraints(x);
        self.problem.objective(x) + self.lambda.dot(&c) + 0.5 * self.mu * c.norm_squared()
    }

    fn gradient_at(&self, x: &DVector<f64>) -> DVector<f64> {
        let c = self.problem.constraints(x);
        let shifted = self.lambda + &c * self.mu;
        self.problem.gradient(x) + self.problem.constraint_jacobian(x).transpose() * shifted
    }

    /// Infinity norm of `clamp(x - grad L(x)) - x` for a point inside the box.
    fn projected_gradient_norm(&self, x: &DVector<f64>) -> f64 {
        let step = x - self.gradient_at(x);
        (self.clamp(step.iter()) - x).amax()
    }

    fn restart_from(&self, x: &DVector<f64>, value: f64) {
        let mut incumbent = self.incumbent.borrow_mut();
        incumbent.x = x.clone();
        incumbent.value = value;
        incumbent.gradient_evaluations = 0;
    }

    fn incumbent(&self) -> (DVector<f64>, f64, usize) {
        let incumbent = self.incumbent.borrow();
        (
            incumbent.x.clone(),
            incumbent.value,
            incumbent.gradient_evaluations,
        )
    }
}

fn require_finite(x: &[f64]) -> Result<(), ArgminError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ArgminError::msg("iterate has non-finite components"))
    }
}

impl<P> CostFunction for PenaltySubproblem<'_, P>
where
    P: ConstrainedProblem + ?Sized,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        require_finite(x)?;
        let clamped = self.clamp(x);
        let outside: f64 = x
            .iter()
            .zip(clamped.iter())
            .map(|(v, c)| (v - c).powi(2))
            .sum();
        let value = self.value(&clamped);

        let mut incumbent = self.incumbent.borrow_mut();
        if value < incumbent.value {
            incumbent.value = value;
            incumbent.x = clamped;
        }
        Ok(value + 0.5 * BOUND_PENALTY * outside)
    }
}

impl<P> Gradient for PenaltySubproblem<'_, P>
where
    P: ConstrainedProblem + ?Sized,
{
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        require_finite(x)?;
        self.incumbent.borrow_mut().gradient_evaluations += 1;
        let clamped = self.clamp(x);
        let inner = self.gradient_at(&clamped);
        Ok(x.iter()
            .zip(clamped.iter())
            .zip(inner.iter())
            .map(|((&v, &c), &g)| if v == c { g } else { BOUND_PENALTY * (v - c) })
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangian {
    settings: SolverSettings,
}

impl AugmentedLagrangian {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Minimizes `problem` starting from `x0`, optionally warm-starting the multipliers.
    ///
    /// Never fails outright: a run that exhausts its iteration budget returns an outcome with
    /// `converged == false` and the best point it found.
    #[instrument(skip_all, name = "augmented_lagrangian", fields(dimension = problem.dimension()))]
    pub fn minimize<P>(
        &self,
        problem: &P,
        x0: &DVector<f64>,
        multipliers: Option<&DVector<f64>>,
    ) -> SolverOutcome
    where
        P: ConstrainedProblem + ?Sized,
    {
        let bounds = problem.bounds();
        let project = |x: &DVector<f64>| -> DVector<f64> {
            DVector::from_iterator(
                x.len(),
                x.iter().zip(bounds.iter()).map(|(&v, b)| b.clamp(v)),
            )
        };

        let num_constraints = problem.num_constraints();
        let mut lambda = multipliers
            .filter(|m| m.len() == num_constraints)
            .cloned()
            .unwrap_or_else(|| DVector::zeros(num_constraints));
        let mut mu = self.settings.initial_penalty;
        let mut x = project(x0);
        let mut previous_violation = f64::INFINITY;
        let mut inner_iterations = 0;
        let mut best: Option<(DVector<f64>, f64, f64)> = None;
        let mut last = (0.0, f64::INFINITY);
        let incumbent = Incumbent::empty();

        for outer in 1..=self.settings.max_iterations {
            let subproblem = PenaltySubproblem::new(problem, &bounds, &lambda, mu, &incumbent);
            let inner = self.minimize_subproblem(&subproblem, x);
            inner_iterations += inner.iterations;
            x = inner.x;

            let c = problem.constraints(&x);
            let violation = c.amax();
            let objective = problem.objective(&x);
            last = (objective, violation);
            trace!(
                outer,
                objective,
                violation,
                penalty = mu,
                inner = inner.iterations,
                stationary = inner.stationary,
                "Augmented Lagrangian iteration."
            );

            lambda += &c * mu;

            if violation <= self.settings.constraint_tolerance {
                if best.as_ref().is_none_or(|(_, f, _)| objective < *f) {
                    best = Some((x.clone(), objective, violation));
                }
                if inner.stationary {
                    return SolverOutcome {
                        x,
                        multipliers: lambda,
                        objective,
                        max_constraint_violation: violation,
                        iterations: outer,
                        inner_iterations,
                        converged: true,
                    };
                }
            }

            if violation > 0.25 * previous_violation {
                mu = (mu * self.settings.penalty_growth).min(self.settings.max_penalty);
            }
            previous_violation = violation;
        }

        let (x, objective, max_constraint_violation) =
            best.unwrap_or((x, last.0, last.1));
        SolverOutcome {
            x,
            multipliers: lambda,
            objective,
            max_constraint_violation,
            iterations: self.settings.max_iterations,
            inner_iterations,
            converged: false,
        }
    }

    /// Runs BFGS from `x0` (inside the box) until the projected gradient is small, the inner
    /// budget is spent, or a restart from the identity no longer lowers `L`.
    ///
    /// The point is stationary when the projected gradient is at most `gradient_tolerance`
    /// relative to `max(1, |L|)`. Once `L` stops decreasing at the rounding level, the square root
    /// of that tolerance is accepted instead; anything larger is reported as not stationary.
    fn minimize_subproblem<P>(
        &self,
        subproblem: &PenaltySubproblem<'_, P>,
        x0: DVector<f64>,
    ) -> InnerResult
    where
        P: ConstrainedProblem + ?Sized,
    {
        let mut x = x0;
        let mut value = subproblem.value(&x);
        let mut iterations = 0;

        loop {
            let scale = value.abs().max(1.0);
            let measure = subproblem.projected_gradient_norm(&x);
            if measure <= self.settings.gradient_tolerance * scale {
                return InnerResult {
                    x,
                    iterations,
                    stationary: true,
                };
            }
            let remaining = self.settings.inner_max_iterations.saturating_sub(iterations);
            if remaining == 0 {
                return InnerResult {
                    x,
                    iterations,
                    stationary: false,
                };
            }

            subproblem.restart_from(&x, value);
            if let Err(error) = self.run_quasi_newton(subproblem, &x, remaining, scale) {
                trace!(%error, "Quasi-Newton run stopped early.");
            }
            let (candidate, candidate_value, gradient_evaluations) = subproblem.incumbent();
            iterations += gradient_evaluations.saturating_sub(1).clamp(1, remaining);

            // NaN-safe: a non-finite candidate never counts as progress.
            let progressed = value - candidate_value > self.settings.objective_tolerance * scale;
            if !progressed {
                let stationary = measure <= self.settings.gradient_tolerance.sqrt() * scale;
                return InnerResult {
                    x,
                    iterations,
                    stationary,
                };
            }
            x = candidate;
            value = candidate_value;
        }
    }

    fn run_quasi_newton<P>(
        &self,
        subproblem: &PenaltySubproblem<'_, P>,
        x0: &DVector<f64>,
        max_iterations: usize,
        scale: f64,
    ) -> Result<(), ArgminError>
    where
        P: ConstrainedProblem + ?Sized,
    {
        let linesearch = BacktrackingLineSearch::<Vec<f64>, Vec<f64>, _, f64>::new(
            ArmijoCondition::new(ARMIJO_FRACTION)?,
        )
        .rho(BACKTRACKING_FACTOR)?;
        let solver: BFGS<_, f64> = BFGS::new(linesearch)
            .with_tolerance_grad(self.settings.gradient_tolerance * scale)?
            .with_tolerance_cost(self.settings.objective_tolerance * scale)?;

        let start: Vec<f64> = x0.iter().copied().collect();
        let dimension = start.len();
        Executor::new(*subproblem, solver)
            .configure(|state| {
                state
                    .param(start)
                    .inv_hessian(Vec::<Vec<f64>>::eye(dimension))
                    .max_iters(max_iterations as u64)
            })
            .run()?;
        Ok(())
    }
}
