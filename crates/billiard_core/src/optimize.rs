//! Nonlinear conjugate-gradient minimization on top of `argmin`.
//!
//! Polak-Ribière directions with a More-Thuente line search, restarted every
//! `n` iterations and whenever consecutive gradients lose orthogonality.
//! Running out of iterations or a stalled line search is not an error: the
//! best iterate is returned together with an [`OptimizationReport`] saying
//! why the loop stopped.

use std::cell::Cell;

use argmin::core::{
    CostFunction, Error as ArgminError, Executor, Gradient, IterState, Problem, Solver, State,
    TerminationReason, TerminationStatus, KV,
};
use argmin::solver::conjugategradient::beta::PolakRibiere;
use argmin::solver::conjugategradient::NonlinearConjugateGradient;
use argmin::solver::linesearch::{LineSearch, MoreThuenteLineSearch};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{BilliardError, Result};
use crate::traits::Objective;

type CgState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;
type MoreThuente = MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Stop once the max-norm of the gradient falls below this.
    pub gradient_tolerance: f64,
    /// Defaults to `200 * dimension`.
    pub max_iterations: Option<usize>,
    /// Upper bound on the max-norm of a single step.
    pub max_step: Option<f64>,
    pub armijo: f64,
    pub curvature: f64,
    /// Restart with steepest descent once `|g_k . g_{k-1}| / |g_k|^2` exceeds this.
    pub restart_orthogonality: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-5,
            max_iterations: None,
            max_step: None,
            armijo: 1e-4,
            curvature: 0.1,
            restart_orthogonality: 0.1,
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.gradient_tolerance > 0.0) {
            return Err(BilliardError::invalid("gradient_tolerance must be positive"));
        }
        if self.max_iterations == Some(0) {
            return Err(BilliardError::invalid("max_iterations must be greater than zero"));
        }
        if let Some(step) = self.max_step {
            if !(step > 0.0) {
                return Err(BilliardError::invalid("max_step must be positive"));
            }
        }
        if !(0.0 < self.armijo && self.armijo < self.curvature && self.curvature < 1.0) {
            return Err(BilliardError::invalid(
                "line search constants must satisfy 0 < armijo < curvature < 1",
            ));
        }
        if !(self.restart_orthogonality > 0.0) {
            return Err(BilliardError::invalid("restart_orthogonality must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub converged: bool,
    pub iterations: usize,
    pub function_evaluations: usize,
    pub gradient_evaluations: usize,
    pub objective: f64,
    pub gradient_norm: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub solution: Vec<f64>,
    pub report: OptimizationReport,
}

#[derive(Default)]
struct Counters {
    values: Cell<usize>,
    gradients: Cell<usize>,
}

/// Presents an [`Objective`] to argmin over plain `Vec<f64>` parameters.
struct ArgminObjective<'a, O> {
    objective: &'a O,
    counters: &'a Counters,
}

impl<O: Objective> CostFunction for ArgminObjective<'_, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        self.counters.values.set(self.counters.values.get() + 1);
        let value = self.objective.value(&DVector::from_column_slice(param))?;
        if !value.is_finite() {
            return Err(ArgminError::msg("objective is not finite"));
        }
        Ok(value)
    }
}

impl<O: Objective> Gradient for ArgminObjective<'_, O> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        self.counters.gradients.set(self.counters.gradients.get() + 1);
        let gradient = self.objective.gradient(&DVector::from_column_slice(param))?;
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(ArgminError::msg("gradient is not finite"));
        }
        Ok(gradient.iter().copied().collect())
    }
}

/// More-Thuente search whose step length is bounded so that no coordinate
/// moves further than `max_step`. The bound depends on the search
/// direction, so the inner search is rebuilt for every line search.
#[derive(Clone)]
struct CappedLineSearch {
    armijo: f64,
    curvature: f64,
    max_step: Option<f64>,
    direction: Vec<f64>,
    initial_step: f64,
    inner: Option<MoreThuente>,
}

impl CappedLineSearch {
    fn new(settings: &OptimizerSettings) -> Self {
        Self {
            armijo: settings.armijo,
            curvature: settings.curvature,
            max_step: settings.max_step,
            direction: Vec::new(),
            initial_step: 1.0,
            inner: None,
        }
    }
}

impl LineSearch<Vec<f64>, f64> for CappedLineSearch {
    fn search_direction(&mut self, direction: Vec<f64>) {
        self.direction = direction;
    }

    fn initial_step_length(&mut self, step_length: f64) -> std::result::Result<(), ArgminError> {
        self.initial_step = step_length;
        Ok(())
    }
}

impl<O> Solver<O, CgState> for CappedLineSearch
where
    MoreThuente: Solver<O, CgState>,
{
    fn name(&self) -> &str {
        "More-Thuente (step capped)"
    }

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: CgState,
    ) -> std::result::Result<(CgState, Option<KV>), ArgminError> {
        let mut inner = MoreThuente::new().with_c(self.armijo, self.curvature)?;
        let mut initial_step = self.initial_step;
        if let Some(cap) = self.max_step {
            let max_alpha = cap / max_norm(&self.direction);
            inner = inner.with_bounds(f64::EPSILON.sqrt().min(0.5 * max_alpha), max_alpha)?;
            initial_step = initial_step.min(max_alpha);
        }
        inner.initial_step_length(initial_step)?;
        inner.search_direction(self.direction.clone());

        let (state, kv) = <MoreThuente as Solver<O, CgState>>::init(&mut inner, problem, state)?;
        self.inner = Some(inner);
        Ok((state, kv))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: CgState,
    ) -> std::result::Result<(CgState, Option<KV>), ArgminError> {
        match self.inner.as_mut() {
            Some(inner) => <MoreThuente as Solver<O, CgState>>::next_iter(inner, problem, state),
            None => Err(ArgminError::msg("line search used before initialization")),
        }
    }

    fn terminate(&mut self, state: &CgState) -> TerminationStatus {
        match self.inner.as_mut() {
            Some(inner) => <MoreThuente as Solver<O, CgState>>::terminate(inner, state),
            None => TerminationStatus::NotTerminated,
        }
    }
}

/// Stops the wrapped solver on a small gradient and turns a failed
/// iteration into a termination of the run at the last good iterate.
struct GradientStop<S> {
    inner: S,
    tolerance: f64,
}

impl<O, S> Solver<O, CgState> for GradientStop<S>
where
    S: Solver<O, CgState>,
{
    fn name(&self) -> &str {
        <S as Solver<O, CgState>>::name(&self.inner)
    }

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: CgState,
    ) -> std::result::Result<(CgState, Option<KV>), ArgminError> {
        self.inner.init(problem, state)
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: CgState,
    ) -> std::result::Result<(CgState, Option<KV>), ArgminError> {
        let last_good = state.clone();
        match self.inner.next_iter(problem, state) {
            Ok(step) => Ok(step),
            Err(err) => {
                log::debug!("conjugate gradient iteration failed: {err}");
                let reason = TerminationReason::SolverExit(err.to_string());
                Ok((last_good.terminate_with(reason), None))
            }
        }
    }

    fn terminate(&mut self, state: &CgState) -> TerminationStatus {
        match state.get_gradient() {
            Some(gradient) if max_norm(gradient) <= self.tolerance => {
                TerminationStatus::Terminated(TerminationReason::SolverConverged)
            }
            _ => <S as Solver<O, CgState>>::terminate(&mut self.inner, state),
        }
    }
}

fn max_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

fn optimizer_error(err: ArgminError) -> BilliardError {
    match err.downcast::<BilliardError>() {
        Ok(err) => err,
        Err(other) => BilliardError::invalid(format!("optimizer failed to start: {other}")),
    }
}

/// Minimizes `objective` from `initial_guess`.
///
/// Errors are reserved for invalid input (bad settings, dimension mismatch,
/// failure at the initial point); numerical stalls are reported in the
/// returned [`OptimizationReport`].
pub fn minimize<O: Objective>(
    objective: &O,
    initial_guess: DVector<f64>,
    settings: &OptimizerSettings,
) -> Result<OptimizationResult> {
    settings.validate()?;
    let dim = objective.dimension();
    if initial_guess.len() != dim {
        return Err(BilliardError::invalid(format!(
            "initial guess dimension mismatch: expected {}, got {}",
            dim,
            initial_guess.len()
        )));
    }

    let start_value = objective.value(&initial_guess)?;
    let start_gradient = objective.gradient(&initial_guess)?;
    if !start_value.is_finite() || start_gradient.iter().any(|g| !g.is_finite()) {
        return Err(BilliardError::invalid(
            "objective is not finite at the initial guess",
        ));
    }

    let max_iterations = settings.max_iterations.unwrap_or(200 * dim.max(1));
    let start: Vec<f64> = initial_guess.iter().copied().collect();
    let counters = Counters::default();
    let problem = ArgminObjective {
        objective,
        counters: &counters,
    };
    let solver = GradientStop {
        inner: NonlinearConjugateGradient::new(CappedLineSearch::new(settings), PolakRibiere::new())
            .restart_iters(dim.max(1) as u64)
            .restart_orthogonality(settings.restart_orthogonality),
        tolerance: settings.gradient_tolerance,
    };

    let result = Executor::new(problem, solver)
        .configure(|state| state.param(start.clone()).max_iters(max_iterations as u64))
        .timer(false)
        .run()
        .map_err(optimizer_error)?;
    let state = result.state();

    let solution = state
        .get_best_param()
        .or_else(|| state.get_param())
        .cloned()
        .unwrap_or(start);
    let iterations = state.get_iter() as usize;
    let reason = state.get_termination_reason().cloned();

    let point = DVector::from_column_slice(&solution);
    let value = objective.value(&point)?;
    let gradient_norm = max_norm(objective.gradient(&point)?.as_slice());
    let converged = gradient_norm <= settings.gradient_tolerance;
    let message = match reason {
        _ if converged => "gradient norm below tolerance".to_string(),
        Some(TerminationReason::MaxItersReached) => {
            format!("maximum number of iterations ({max_iterations}) exceeded")
        }
        Some(TerminationReason::SolverExit(text)) => format!("line search stalled: {text}"),
        Some(other) => format!("optimizer stopped early ({other:?})"),
        None => "optimizer stopped without a termination reason".to_string(),
    };

    Ok(OptimizationResult {
        solution,
        report: OptimizationReport {
            converged,
            iterations,
            function_evaluations: counters.values.get(),
            gradient_evaluations: counters.gradients.get(),
            objective: value,
            gradient_norm,
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;

    struct Quadratic {
        a: DMatrix<f64>,
        b: DVector<f64>,
    }

    impl Objective for Quadratic {
        fn dimension(&self) -> usize {
            self.b.len()
        }

        fn value(&self, x: &DVector<f64>) -> Result<f64> {
            Ok(0.5 * x.dot(&(&self.a * x)) - self.b.dot(x))
        }

        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
            Ok(&self.a * x - &self.b)
        }
    }

    struct Rosenbrock;

    impl Objective for Rosenbrock {
        fn dimension(&self) -> usize {
            2
        }

        fn value(&self, x: &DVector<f64>) -> Result<f64> {
            Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        }

        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
            let inner = x[1] - x[0] * x[0];
            Ok(DVector::from_vec(vec![
                -2.0 * (1.0 - x[0]) - 400.0 * x[0] * inner,
                200.0 * inner,
            ]))
        }
    }

    struct Broken;

    impl Objective for Broken {
        fn dimension(&self) -> usize {
            1
        }

        fn value(&self, _x: &DVector<f64>) -> Result<f64> {
            Err(BilliardError::invalid("no value here"))
        }

        fn gradient(&self, _x: &DVector<f64>) -> Result<DVector<f64>> {
            Ok(DVector::zeros(1))
        }
    }

    #[test]
    fn minimizes_quadratic() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
        let b = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let expected = a.clone().lu().solve(&b).expect("matrix is invertible");
        let problem = Quadratic { a, b };

        let result = minimize(&problem, DVector::zeros(3), &OptimizerSettings::default())
            .expect("minimization should run");
        assert!(result.report.converged, "{}", result.report.message);
        for (x, e) in result.solution.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *e, epsilon = 1e-4);
        }
    }

    #[test]
    fn starts_at_a_critical_point() {
        let problem = Quadratic {
            a: DMatrix::identity(2, 2),
            b: DVector::from_vec(vec![1.0, -1.0]),
        };
        let result = minimize(
            &problem,
            DVector::from_vec(vec![1.0, -1.0]),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(result.report.converged, "{}", result.report.message);
        assert_eq!(result.solution, vec![1.0, -1.0]);
        assert_eq!(result.report.gradient_norm, 0.0);
    }

    #[test]
    fn minimizes_rosenbrock() {
        let settings = OptimizerSettings {
            max_iterations: Some(5000),
            ..OptimizerSettings::default()
        };
        let result = minimize(&Rosenbrock, DVector::from_vec(vec![-1.2, 1.0]), &settings)
            .expect("minimization should run");
        assert!(result.report.objective < 1e-6, "{}", result.report.message);
        assert_abs_diff_eq!(result.solution[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(result.solution[1], 1.0, epsilon = 1e-2);
        assert!(result.report.function_evaluations >= result.report.iterations);
        assert!(result.report.gradient_evaluations > 0);
    }

    #[test]
    fn iteration_budget_returns_best_iterate() {
        let settings = OptimizerSettings {
            max_iterations: Some(2),
            ..OptimizerSettings::default()
        };
        let start = DVector::from_vec(vec![-1.2, 1.0]);
        let start_value = Rosenbrock.value(&start).unwrap();
        let result = minimize(&Rosenbrock, start, &settings).unwrap();
        assert!(!result.report.converged);
        assert!(result.report.message.contains("maximum number of iterations"));
        assert_eq!(result.report.iterations, 2);
        assert!(result.report.objective < start_value);
    }

    #[test]
    fn max_step_caps_each_move() {
        let problem = Quadratic {
            a: DMatrix::identity(1, 1),
            b: DVector::from_vec(vec![10.0]),
        };
        let settings = OptimizerSettings {
            max_step: Some(0.5),
            max_iterations: Some(1),
            ..OptimizerSettings::default()
        };
        let result = minimize(&problem, DVector::zeros(1), &settings).unwrap();
        assert!(result.solution[0] <= 0.5 + 1e-12);
        assert!(result.solution[0] >= 0.0);
        assert!(!result.report.converged);
    }

    #[test]
    fn rejects_bad_input() {
        let problem = Quadratic {
            a: DMatrix::identity(2, 2),
            b: DVector::zeros(2),
        };
        assert!(minimize(&problem, DVector::zeros(3), &OptimizerSettings::default()).is_err());

        let bad = OptimizerSettings {
            armijo: 0.5,
            curvature: 0.4,
            ..OptimizerSettings::default()
        };
        assert!(minimize(&problem, DVector::zeros(2), &bad).is_err());
        let bad = OptimizerSettings {
            restart_orthogonality: 0.0,
            ..OptimizerSettings::default()
        };
        assert!(minimize(&problem, DVector::zeros(2), &bad).is_err());
        assert!(minimize(&Broken, DVector::zeros(1), &OptimizerSettings::default()).is_err());
    }
}
