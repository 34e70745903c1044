use std::time::Duration;
use nalgebra::DVector;
use serde::{Serialize, Deserialize};
use optimization_engine::{constraints, Optimizer, Problem, SolverError};
use optimization_engine::alm::{AlmCache, AlmFactory, AlmOptimizer, AlmProblem, NO_JACOBIAN_MAPPING, NO_MAPPING};
use optimization_engine::core::ExitStatus;
use optimization_engine::panoc::{PANOCCache, PANOCOptimizer};
#[cfg(feature = "nlopt_optimization")]
use nlopt::*;
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, PrintColor, PrintMode};
use crate::utils::utils_errors::{ArmoptError, SolveFailureReport};

/// A finite-dimensional nonlinear program in the form every back-end consumes:
///
/// minimize `cost(x)` subject to `var_lower <= x <= var_upper` and
/// `con_lower <= constraints(x) <= con_upper`.
///
/// Equality rows have equal lower and upper bounds.  Bounds may be infinite.
pub trait NonlinearProgram {
    fn num_decision_variables(&self) -> usize;
    fn num_constraints(&self) -> usize;
    fn decision_variable_bounds(&self) -> (Vec<f64>, Vec<f64>);
    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>);
    fn cost(&self, x: &[f64]) -> f64;
    fn cost_gradient(&self, x: &[f64], grad: &mut [f64]);
    fn constraints(&self, x: &[f64], out: &mut [f64]);
    /// Writes `J(x)^T d` into `out`, where `J` is the constraint Jacobian.
    fn constraint_jacobian_transpose_product(&self, x: &[f64], d: &[f64], out: &mut [f64]);
    /// Largest distance of any variable or constraint row outside its bounds.
    fn max_constraint_violation(&self, x: &[f64]) -> f64 {
        let mut out = 0.0_f64;

        let (var_lower, var_upper) = self.decision_variable_bounds();
        for (i, v) in x.iter().enumerate() {
            out = out.max(var_lower[i] - *v).max(*v - var_upper[i]);
        }

        let m = self.num_constraints();
        if m > 0 {
            let mut g = vec![0.0; m];
            self.constraints(x, &mut g);
            let (con_lower, con_upper) = self.constraint_bounds();
            for i in 0..m {
                if !g[i].is_finite() { return f64::INFINITY; }
                out = out.max(con_lower[i] - g[i]).max(g[i] - con_upper[i]);
            }
        }

        out
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone)]
pub enum NonlinearOptimizer {
    OpEn(OpEnNonlinearOptimizer),
    #[cfg(feature = "nlopt_optimization")]
    Nlopt(NLoptNonlinearOptimizer)
}
impl NonlinearOptimizer {
    pub fn new(t: NonlinearOptimizerType) -> Self {
        return match t {
            NonlinearOptimizerType::OpEn => { Self::OpEn(OpEnNonlinearOptimizer::new()) }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizerType::NloptSLSQP => { Self::Nlopt(NLoptNonlinearOptimizer::new_slsqp()) }
        }
    }
    /// Runs the back-end from `init_condition`.  Anything short of a converged point that
    /// satisfies every bound and constraint row to within
    /// [`OptimizerParameters::feasibility_tolerance`] comes back as a solve failure.
    pub fn optimize<P: NonlinearProgram>(&self, program: &P, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, ArmoptError> {
        if init_condition.len() != program.num_decision_variables() {
            return Err(ArmoptError::new_configuration_error_str(&format!("initial condition has length {} but the program has {} decision variables.", init_condition.len(), program.num_decision_variables()), file!(), line!()));
        }

        let result = match self {
            NonlinearOptimizer::OpEn(n) => { n.optimize(program, init_condition, parameters)? }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.optimize(program, init_condition, parameters)? }
        };

        if parameters.verbose { result.print_summary(); }

        return result.check(parameters.feasibility_tolerance);
    }
    pub fn optimizer_type(&self) -> NonlinearOptimizerType {
        return match self {
            NonlinearOptimizer::OpEn(_) => { NonlinearOptimizerType::OpEn }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(_) => { NonlinearOptimizerType::NloptSLSQP }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonlinearOptimizerType {
    OpEn,
    #[cfg(feature = "nlopt_optimization")]
    NloptSLSQP
}
impl Default for NonlinearOptimizerType {
    fn default() -> Self { Self::OpEn }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Augmented Lagrangian method over PANOC.  Constraint rows go in as the ALM mapping `F1` with
/// the box of row bounds as the set `C`; variable bounds are the PANOC rectangle.
#[derive(Clone, Debug, Default)]
pub struct OpEnNonlinearOptimizer;
impl OpEnNonlinearOptimizer {
    pub fn new() -> Self {
        Self
    }
    pub fn optimize<P: NonlinearProgram>(&self, program: &P, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, ArmoptError> {
        return if program.num_constraints() == 0 {
            self.optimize_panoc(program, init_condition, parameters)
        } else {
            self.optimize_alm(program, init_condition, parameters)
        }
    }
    fn optimize_panoc<P: NonlinearProgram>(&self, program: &P, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, ArmoptError> {
        let n = program.num_decision_variables();
        let mut panoc_cache = PANOCCache::new(n, parameters.open_tolerance, parameters.lbfgs_memory);

        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            program.cost_gradient(u, grad);
            if grad.iter().any(|g| !g.is_finite()) { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };
        let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            *cost = program.cost(u);
            if !cost.is_finite() { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };

        let (var_lower, var_upper) = program.decision_variable_bounds();
        let bounds = constraints::Rectangle::new(Some(&var_lower), Some(&var_upper));

        let problem = Problem::new(&bounds, df, f);

        let mut panoc = PANOCOptimizer::new(problem, &mut panoc_cache);
        if let Some(a) = parameters.max_time() { panoc = panoc.with_max_duration(a); }
        if let Some(a) = &parameters.max_inner_iterations { panoc = panoc.with_max_iter(*a); }
        panoc = panoc.with_tolerance(parameters.open_tolerance);

        let start = instant::Instant::now();
        let mut u = init_condition.as_slice().to_vec();
        let status = match panoc.solve(&mut u) {
            Ok(status) => { status }
            Err(e) => { return Err(solver_abort_failure(e, program, &u, start.elapsed())); }
        };

        let open_result = OpEnResult {
            max_constraint_violation: program.max_constraint_violation(&u),
            x_min: DVector::from_vec(u),
            exit_status: status.exit_status(),
            num_outer_iterations: 0,
            num_inner_iterations: status.iterations(),
            solve_time: status.solve_time(),
            cost: status.cost_value()
        };

        return Ok(OptimizerResult::OpEn(open_result));
    }
    fn optimize_alm<P: NonlinearProgram>(&self, program: &P, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, ArmoptError> {
        let n = program.num_decision_variables();
        let m = program.num_constraints();

        let panoc_cache = PANOCCache::new(n, parameters.open_tolerance, parameters.lbfgs_memory);
        let mut alm_cache = AlmCache::new(panoc_cache, m, 0);

        let (var_lower, var_upper) = program.decision_variable_bounds();
        let (con_lower, con_upper) = program.constraint_bounds();
        let bounds = constraints::Rectangle::new(Some(&var_lower), Some(&var_upper));
        let set_c = constraints::Rectangle::new(Some(&con_lower), Some(&con_upper));
        let set_c_for_problem = constraints::Rectangle::new(Some(&con_lower), Some(&con_upper));
        let set_y = constraints::BallInf::new(None, parameters.lagrange_multiplier_bound);

        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            program.cost_gradient(u, grad);
            if grad.iter().any(|g| !g.is_finite()) { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };
        let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            *cost = program.cost(u);
            if !cost.is_finite() { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };
        let f1 = |u: &[f64], f1u: &mut [f64]| -> Result<(), SolverError> {
            program.constraints(u, f1u);
            if f1u.iter().any(|g| !g.is_finite()) { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };
        let f1_jacobian_product = |u: &[f64], d: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
            program.constraint_jacobian_transpose_product(u, d, res);
            if res.iter().any(|g| !g.is_finite()) { return Err(SolverError::NotFiniteComputation); }
            Ok(())
        };

        let factory = AlmFactory::new(
            f,
            df,
            Some(f1),
            Some(f1_jacobian_product),
            NO_MAPPING,
            NO_JACOBIAN_MAPPING,
            Some(set_c),
            0
        );

        let alm_problem = AlmProblem::new(
            bounds,
            Some(set_c_for_problem),
            Some(set_y),
            |u: &[f64], xi: &[f64], cost: &mut f64| -> Result<(), SolverError> {
                factory.psi(u, xi, cost)
            },
            |u: &[f64], xi: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
                factory.d_psi(u, xi, grad)
            },
            Some(f1),
            NO_MAPPING,
            m,
            0
        );

        let mut alm_optimizer = AlmOptimizer::new(&mut alm_cache, alm_problem)
            .with_epsilon_tolerance(parameters.open_tolerance)
            .with_delta_tolerance(parameters.delta_tolerance);
        if let Some(a) = parameters.max_time() { alm_optimizer = alm_optimizer.with_max_duration(a); }
        if let Some(a) = &parameters.max_inner_iterations { alm_optimizer = alm_optimizer.with_max_inner_iterations(*a); }
        if let Some(a) = &parameters.max_outer_iterations { alm_optimizer = alm_optimizer.with_max_outer_iterations(*a); }
        if let Some(a) = &parameters.initial_penalty { alm_optimizer = alm_optimizer.with_initial_penalty(*a); }

        let start = instant::Instant::now();
        let mut u = init_condition.as_slice().to_vec();
        let r = match alm_optimizer.solve(&mut u) {
            Ok(r) => { r }
            Err(e) => { return Err(solver_abort_failure(e, program, &u, start.elapsed())); }
        };

        let open_result = OpEnResult {
            max_constraint_violation: program.max_constraint_violation(&u),
            x_min: DVector::from_vec(u),
            exit_status: r.exit_status(),
            num_outer_iterations: r.num_outer_iterations(),
            num_inner_iterations: r.num_inner_iterations(),
            solve_time: r.solve_time(),
            cost: r.cost()
        };

        return Ok(OptimizerResult::OpEn(open_result));
    }
}

/// OpEn returns no iteration counts on an abort, so the report carries the error kind, the time
/// spent, and the cost and violation at whatever point is left in `u`.
fn solver_abort_failure<P: NonlinearProgram>(e: SolverError, program: &P, u: &[f64], elapsed: Duration) -> ArmoptError {
    let message = match e {
        SolverError::NotFiniteComputation => { "solver aborted: an iterate produced a non-finite cost, gradient or constraint value" }
        _ => { "solver aborted: a cost or constraint evaluation failed" }
    };
    let mut report = SolveFailureReport::new(&format!("{:?}", e), message);
    report.solve_time = Some(elapsed);
    let cost = program.cost(u);
    if cost.is_finite() { report.cost = Some(cost); }
    report.max_constraint_violation = Some(program.max_constraint_violation(u));
    return ArmoptError::new_solve_failure(report);
}

/// NLopt SLSQP.  Each constraint row becomes a scalar NLopt constraint: equality rows as
/// equalities, finite sides of ranged rows as `<= 0` inequalities.
#[cfg(feature = "nlopt_optimization")]
#[derive(Clone)]
pub struct NLoptNonlinearOptimizer {
    algorithm: Algorithm
}
#[cfg(feature = "nlopt_optimization")]
impl NLoptNonlinearOptimizer {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }
    pub fn new_slsqp() -> Self {
        Self::new(Algorithm::Slsqp)
    }
    pub fn optimize<P: NonlinearProgram>(&self, program: &P, init_condition: &DVector<f64>, parameters: &OptimizerParameters) -> Result<OptimizerResult, ArmoptError> {
        let start = instant::Instant::now();
        let n = program.num_decision_variables();

        let obj_f = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
            if let Some(gradient) = _gradient {
                program.cost_gradient(x, gradient);
            }
            return program.cost(x);
        };

        let mut nlopt = Nlopt::new(self.algorithm.clone(), n, obj_f, Target::Minimize, ());

        let (con_lower, con_upper) = program.constraint_bounds();
        for i in 0..program.num_constraints() {
            if con_lower[i] == con_upper[i] {
                nlopt.add_equality_constraint(Self::constraint_row(program, i, con_upper[i], 1.0), (), parameters.nlopt_constraint_tolerance).map_err(|e| nlopt_setup_error(e))?;
                continue;
            }
            if con_upper[i].is_finite() {
                nlopt.add_inequality_constraint(Self::constraint_row(program, i, con_upper[i], 1.0), (), parameters.nlopt_constraint_tolerance).map_err(|e| nlopt_setup_error(e))?;
            }
            if con_lower[i].is_finite() {
                nlopt.add_inequality_constraint(Self::constraint_row(program, i, con_lower[i], -1.0), (), parameters.nlopt_constraint_tolerance).map_err(|e| nlopt_setup_error(e))?;
            }
        }

        let (var_lower, var_upper) = program.decision_variable_bounds();
        nlopt.set_lower_bounds(&var_lower).map_err(|e| nlopt_setup_error(e))?;
        nlopt.set_upper_bounds(&var_upper).map_err(|e| nlopt_setup_error(e))?;
        if let Some(a) = parameters.max_time() { nlopt.set_maxtime(a.as_secs_f64()).map_err(|e| nlopt_setup_error(e))?; }
        if let Some(a) = &parameters.max_inner_iterations { nlopt.set_maxeval(*a as u32).map_err(|e| nlopt_setup_error(e))?; }

        nlopt.set_ftol_rel(parameters.nlopt_ftol_rel).map_err(|e| nlopt_setup_error(e))?;
        nlopt.set_ftol_abs(parameters.nlopt_ftol_abs).map_err(|e| nlopt_setup_error(e))?;
        nlopt.set_xtol_rel(parameters.nlopt_xtol_rel).map_err(|e| nlopt_setup_error(e))?;

        let mut x = init_condition.as_slice().to_vec();
        let res = nlopt.optimize(&mut x);
        return match res {
            Ok(r) => {
                let converged = !matches!(r.0, SuccessState::MaxEvalReached | SuccessState::MaxTimeReached);
                let output = NloptResult {
                    max_constraint_violation: program.max_constraint_violation(&x),
                    x_min: DVector::from_vec(x),
                    status: format!("{:?}", r.0),
                    converged,
                    solve_time: start.elapsed(),
                    cost: r.1
                };
                Ok(OptimizerResult::Nlopt(output))
            }
            Err(e) => {
                let mut report = SolveFailureReport::new(&format!("{:?}", e.0), "nlopt reported a failure");
                report.solve_time = Some(start.elapsed());
                report.cost = Some(e.1);
                report.max_constraint_violation = Some(program.max_constraint_violation(&x));
                Err(ArmoptError::new_solve_failure(report))
            }
        }
    }
    /// `sign * (g_row(x) - offset)` with its gradient.
    fn constraint_row<'a, P: NonlinearProgram>(program: &'a P, row: usize, offset: f64, sign: f64) -> impl Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64 + 'a {
        move |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
            let m = program.num_constraints();
            let mut g = vec![0.0; m];
            program.constraints(x, &mut g);
            if let Some(gradient) = _gradient {
                let mut d = vec![0.0; m];
                d[row] = sign;
                program.constraint_jacobian_transpose_product(x, &d, gradient);
            }
            return sign * (g[row] - offset);
        }
    }
}

#[cfg(feature = "nlopt_optimization")]
fn nlopt_setup_error(e: FailState) -> ArmoptError {
    return ArmoptError::new_generic_error_str(&format!("nlopt setup failed: {:?}", e), file!(), line!());
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug)]
pub enum OptimizerResult {
    OpEn(OpEnResult),
    Nlopt(NloptResult)
}
impl OptimizerResult {
    pub fn open_result(&self) -> Option<&OpEnResult> {
        return match self {
            OptimizerResult::OpEn(o) => { Some(o) }
            _ => { None }
        }
    }
    pub fn nlopt_result(&self) -> Option<&NloptResult> {
        return match self {
            OptimizerResult::Nlopt(o) => { Some(o) }
            _ => { None }
        }
    }
    pub fn x_min(&self) -> &DVector<f64> {
        return match self {
            OptimizerResult::OpEn(r) => { r.x_min() }
            OptimizerResult::Nlopt(r) => { r.x_min() }
        }
    }
    pub fn cost(&self) -> f64 {
        return match self {
            OptimizerResult::OpEn(r) => { r.cost() }
            OptimizerResult::Nlopt(r) => { r.cost() }
        }
    }
    pub fn solve_time(&self) -> Duration {
        return match self {
            OptimizerResult::OpEn(r) => { r.solve_time() }
            OptimizerResult::Nlopt(r) => { r.solve_time() }
        }
    }
    pub fn max_constraint_violation(&self) -> f64 {
        return match self {
            OptimizerResult::OpEn(r) => { r.max_constraint_violation() }
            OptimizerResult::Nlopt(r) => { r.max_constraint_violation() }
        }
    }
    pub fn num_outer_iterations(&self) -> usize {
        return match self {
            OptimizerResult::OpEn(r) => { r.num_outer_iterations() }
            OptimizerResult::Nlopt(_) => { 0 }
        }
    }
    pub fn num_inner_iterations(&self) -> usize {
        return match self {
            OptimizerResult::OpEn(r) => { r.num_inner_iterations() }
            OptimizerResult::Nlopt(_) => { 0 }
        }
    }
    pub fn converged(&self) -> bool {
        return match self {
            OptimizerResult::OpEn(r) => { matches!(r.exit_status(), ExitStatus::Converged) }
            OptimizerResult::Nlopt(r) => { r.converged() }
        }
    }
    pub fn exit_status_str(&self) -> String {
        return match self {
            OptimizerResult::OpEn(r) => { format!("{:?}", r.exit_status()) }
            OptimizerResult::Nlopt(r) => { r.status().to_string() }
        }
    }
    fn check(self, feasibility_tolerance: f64) -> Result<Self, ArmoptError> {
        if !self.converged() {
            return Err(ArmoptError::new_solve_failure(self.failure_report("solver stopped before converging")));
        }
        if self.x_min().iter().any(|v| !v.is_finite()) {
            return Err(ArmoptError::new_solve_failure(self.failure_report("solver returned non-finite values")));
        }
        if !(self.max_constraint_violation() <= feasibility_tolerance) {
            return Err(ArmoptError::new_solve_failure(self.failure_report(&format!("returned point violates constraints beyond the feasibility tolerance {:e}", feasibility_tolerance))));
        }
        Ok(self)
    }
    pub(crate) fn failure_report(&self, message: &str) -> SolveFailureReport {
        let mut report = SolveFailureReport::new(&self.exit_status_str(), message);
        report.num_outer_iterations = self.num_outer_iterations();
        report.num_inner_iterations = self.num_inner_iterations();
        report.solve_time = Some(self.solve_time());
        report.cost = Some(self.cost());
        report.max_constraint_violation = Some(self.max_constraint_violation());
        report
    }
    pub fn print_summary(&self) {
        armopt_print(">> Optimizer result", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   exit status", &self.exit_status_str(), PrintColor::Cyan);
        armopt_print_labeled_value("   cost", &format!("{:.6}", self.cost()), PrintColor::Cyan);
        armopt_print_labeled_value("   max constraint violation", &format!("{:.3e}", self.max_constraint_violation()), PrintColor::Cyan);
        armopt_print_labeled_value("   outer / inner iterations", &format!("{} / {}", self.num_outer_iterations(), self.num_inner_iterations()), PrintColor::Cyan);
        armopt_print_labeled_value("   solve time", &format!("{:?}", self.solve_time()), PrintColor::Cyan);
    }
}

#[derive(Clone, Debug)]
pub struct OpEnResult {
    x_min: DVector<f64>,
    exit_status: ExitStatus,
    num_outer_iterations: usize,
    num_inner_iterations: usize,
    solve_time: Duration,
    cost: f64,
    max_constraint_violation: f64
}
impl OpEnResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }
    pub fn num_outer_iterations(&self) -> usize {
        self.num_outer_iterations
    }
    pub fn num_inner_iterations(&self) -> usize {
        self.num_inner_iterations
    }
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
    pub fn max_constraint_violation(&self) -> f64 {
        self.max_constraint_violation
    }
}

#[derive(Clone, Debug)]
pub struct NloptResult {
    x_min: DVector<f64>,
    status: String,
    converged: bool,
    solve_time: Duration,
    cost: f64,
    max_constraint_violation: f64
}
impl NloptResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn status(&self) -> &str {
        &self.status
    }
    pub fn converged(&self) -> bool {
        self.converged
    }
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
    pub fn max_constraint_violation(&self) -> f64 {
        self.max_constraint_violation
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParameters {
    max_time_seconds: Option<f64>,
    max_inner_iterations: Option<usize>,
    max_outer_iterations: Option<usize>,
    /// Inner (PANOC) tolerance.
    open_tolerance: f64,
    /// ALM tolerance on the constraint residual.
    delta_tolerance: f64,
    initial_penalty: Option<f64>,
    lbfgs_memory: usize,
    lagrange_multiplier_bound: f64,
    /// Largest constraint violation a returned point may have and still count as a success.
    feasibility_tolerance: f64,
    nlopt_ftol_rel: f64,
    nlopt_ftol_abs: f64,
    nlopt_xtol_rel: f64,
    nlopt_constraint_tolerance: f64,
    verbose: bool
}
impl OptimizerParameters {
    pub fn new_empty() -> Self {
        Self::default()
    }
    pub fn set_max_time(&mut self, max_time: Duration) {
        self.max_time_seconds = Some(max_time.as_secs_f64());
    }
    pub fn set_max_inner_iterations(&mut self, max_iterations: usize) {
        self.max_inner_iterations = Some(max_iterations);
    }
    pub fn set_max_outer_iterations(&mut self, max_outer_iterations: usize) {
        self.max_outer_iterations = Some(max_outer_iterations)
    }
    pub fn set_open_tolerance(&mut self, tolerance: f64) {
        self.open_tolerance = tolerance;
    }
    pub fn set_delta_tolerance(&mut self, tolerance: f64) {
        self.delta_tolerance = tolerance;
    }
    pub fn set_initial_penalty(&mut self, penalty: f64) {
        self.initial_penalty = Some(penalty);
    }
    pub fn set_lbfgs_memory(&mut self, memory: usize) {
        self.lbfgs_memory = memory;
    }
    pub fn set_feasibility_tolerance(&mut self, tolerance: f64) {
        self.feasibility_tolerance = tolerance;
    }
    pub fn set_ftol_rel(&mut self, val: f64) {
        self.nlopt_ftol_rel = val;
    }
    pub fn set_ftol_abs(&mut self, val: f64) {
        self.nlopt_ftol_abs = val;
    }
    pub fn set_xtol_rel(&mut self, val: f64) {
        self.nlopt_xtol_rel = val;
    }
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
    pub fn max_time(&self) -> Option<Duration> {
        return match self.max_time_seconds {
            Some(s) if s.is_finite() && s > 0.0 => { Some(Duration::from_secs_f64(s)) }
            _ => { None }
        }
    }
    pub fn max_inner_iterations(&self) -> Option<usize> {
        self.max_inner_iterations
    }
    pub fn max_outer_iterations(&self) -> Option<usize> {
        self.max_outer_iterations
    }
    pub fn feasibility_tolerance(&self) -> f64 {
        self.feasibility_tolerance
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}
impl Default for OptimizerParameters {
    fn default() -> Self {
        Self {
            max_time_seconds: None,
            max_inner_iterations: None,
            max_outer_iterations: None,
            open_tolerance: 1e-5,
            delta_tolerance: 1e-4,
            initial_penalty: None,
            lbfgs_memory: 10,
            lagrange_multiplier_bound: 1e12,
            feasibility_tolerance: 1e-3,
            nlopt_ftol_rel: 0.0001,
            nlopt_ftol_abs: 0.0001,
            nlopt_xtol_rel: 0.0001,
            nlopt_constraint_tolerance: 0.000001,
            verbose: false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// minimize (x0 - 2)^2 + (x1 - 1)^2 subject to x0 + x1 in [sum_lower, sum_upper].  With
    /// `nan_above` set the cost is NaN wherever x0 exceeds it.
    struct ShiftedQuadratic {
        var_lower: Vec<f64>,
        var_upper: Vec<f64>,
        sum_bounds: Option<(f64, f64)>,
        nan_above: Option<f64>
    }
    impl NonlinearProgram for ShiftedQuadratic {
        fn num_decision_variables(&self) -> usize { 2 }
        fn num_constraints(&self) -> usize { if self.sum_bounds.is_some() { 1 } else { 0 } }
        fn decision_variable_bounds(&self) -> (Vec<f64>, Vec<f64>) { (self.var_lower.clone(), self.var_upper.clone()) }
        fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
            return match self.sum_bounds {
                None => { (vec![], vec![]) }
                Some((l, u)) => { (vec![l], vec![u]) }
            }
        }
        fn cost(&self, x: &[f64]) -> f64 {
            if let Some(a) = self.nan_above { if x[0] > a { return f64::NAN; } }
            (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2)
        }
        fn cost_gradient(&self, x: &[f64], grad: &mut [f64]) {
            grad[0] = 2.0 * (x[0] - 2.0);
            grad[1] = 2.0 * (x[1] - 1.0);
        }
        fn constraints(&self, x: &[f64], out: &mut [f64]) {
            if self.sum_bounds.is_some() { out[0] = x[0] + x[1]; }
        }
        fn constraint_jacobian_transpose_product(&self, _x: &[f64], d: &[f64], out: &mut [f64]) {
            out[0] = d[0];
            out[1] = d[0];
        }
    }

    fn unbounded(sum_bounds: Option<(f64, f64)>) -> ShiftedQuadratic {
        ShiftedQuadratic { var_lower: vec![f64::NEG_INFINITY; 2], var_upper: vec![f64::INFINITY; 2], sum_bounds, nan_above: None }
    }

    fn params() -> OptimizerParameters {
        let mut p = OptimizerParameters::default();
        p.set_max_time(Duration::from_secs(10));
        p
    }

    #[test]
    fn alm_solves_equality_constrained_quadratic() {
        let program = unbounded(Some((1.0, 1.0)));
        let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
        let res = optimizer.optimize(&program, &DVector::from_vec(vec![0.0, 0.0]), &params()).unwrap();
        let x = res.x_min();
        assert!((x[0] - 1.0).abs() < 1e-3, "{}", x[0]);
        assert!(x[1].abs() < 1e-3, "{}", x[1]);
        assert!(res.converged());
        assert!(res.max_constraint_violation() < 1e-3);
    }

    #[test]
    fn alm_respects_variable_bounds_and_ranged_rows() {
        let program = ShiftedQuadratic { var_lower: vec![-10.0, -10.0], var_upper: vec![0.5, 10.0], sum_bounds: Some((f64::NEG_INFINITY, 1.0)), nan_above: None };
        let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
        let res = optimizer.optimize(&program, &DVector::from_vec(vec![0.0, 0.0]), &params()).unwrap();
        let x = res.x_min();
        assert!(x[0] <= 0.5 + 1e-9);
        assert!((x[0] - 0.5).abs() < 1e-3);
        assert!((x[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn panoc_handles_programs_without_constraint_rows() {
        let program = ShiftedQuadratic { var_lower: vec![-1.0, -1.0], var_upper: vec![1.0, 1.0], sum_bounds: None, nan_above: None };
        let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
        let res = optimizer.optimize(&program, &DVector::from_vec(vec![0.0, 0.0]), &params()).unwrap();
        assert!((res.x_min()[0] - 1.0).abs() < 1e-4);
        assert!((res.x_min()[1] - 1.0).abs() < 1e-4);
        assert_eq!(res.num_outer_iterations(), 0);
    }

    #[test]
    fn infeasible_program_is_a_solve_failure() {
        let program = ShiftedQuadratic { var_lower: vec![0.0, 0.0], var_upper: vec![0.1, 0.1], sum_bounds: Some((1.0, 1.0)), nan_above: None };
        let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
        let mut p = params();
        p.set_max_outer_iterations(30);
        p.set_max_time(Duration::from_secs(5));
        let err = optimizer.optimize(&program, &DVector::from_vec(vec![0.0, 0.0]), &p).unwrap_err();
        assert!(err.is_solve_failure());
        let report = err.solve_failure_report().unwrap();
        if let Some(v) = report.max_constraint_violation { assert!(v > 0.5); }
    }

    #[test]
    fn aborted_solve_reports_what_is_known() {
        for sum_bounds in [None, Some((-10.0, 10.0))] {
            let program = ShiftedQuadratic { nan_above: Some(1.5), ..unbounded(sum_bounds) };
            let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
            let err = optimizer.optimize(&program, &DVector::from_vec(vec![0.0, 0.0]), &params()).unwrap_err();
            assert!(err.is_solve_failure(), "{}", err);
            let report = err.solve_failure_report().unwrap();
            assert_eq!(report.exit_status, "NotFiniteComputation");
            assert!(report.message.contains("non-finite"));
            assert!(report.solve_time.is_some());
            assert!(report.max_constraint_violation.is_some());
        }
    }

    #[test]
    fn wrong_initial_condition_length_is_rejected() {
        let optimizer = NonlinearOptimizer::new(NonlinearOptimizerType::OpEn);
        let err = optimizer.optimize(&unbounded(None), &DVector::from_vec(vec![0.0]), &params()).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn default_violation_measures_rows_and_bounds() {
        let program = ShiftedQuadratic { var_lower: vec![0.0, 0.0], var_upper: vec![1.0, 1.0], sum_bounds: Some((0.5, 1.5)), nan_above: None };
        assert_eq!(program.max_constraint_violation(&[0.5, 0.5]), 0.0);
        assert!((program.max_constraint_violation(&[1.0, 0.75]) - 0.25).abs() < 1e-12);
        assert!((program.max_constraint_violation(&[1.25, 0.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn parameters_load_with_defaults_from_ron() {
        let p: OptimizerParameters = ron::from_str("(max_time_seconds: Some(2.5), verbose: true)").unwrap();
        assert_eq!(p.max_time(), Some(Duration::from_secs_f64(2.5)));
        assert!(p.verbose());
        assert_eq!(p.feasibility_tolerance(), 1e-3);
    }
}
