use std::path::Path;
use nalgebra::DVector;
use serde::{Serialize, Deserialize};
use crate::arm_modules::arm_dynamics_module::{ArmDynamics, ArmDynamicsConfig, ArmState};
use crate::arm_modules::arm_propagator_module::DiscretePropagator;
use crate::nonlinear_optimization::{NonlinearOptimizer, NonlinearOptimizerType, NonlinearProgram, OptimizerParameters};
use crate::trajectory_optimization::arm_trajectory::{ArmTrajectory, SolvedTrajectory};
use crate::trajectory_optimization::single_shooting::SingleShootingProgram;
use crate::utils::utils_autodiff::Dual;
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, armopt_print_warning, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;
use crate::utils::utils_files::load_object_from_config_file;
use crate::utils::utils_math::interpolation::SimpleInterpolationUtils;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalConstraint {
    /// Only the objective pulls the arm toward the target.
    Free,
    /// `state[N]` must equal the target state.
    FullStop
}
impl Default for TerminalConstraint {
    fn default() -> Self { Self::FullStop }
}

/// Which state nodes enter the tracking cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveNodes {
    AllStates,
    ExcludeTerminal
}
impl Default for ObjectiveNodes {
    fn default() -> Self { Self::AllStates }
}

/// What the solver is handed.  `MultipleShooting` passes the full transcription, states and
/// defect rows included.  `SingleShooting` keeps only the controls as decision variables and
/// rolls the propagator forward to get the states, so every defect row holds by construction;
/// the result is lifted back to the full decision vector and checked against every row of the
/// transcription before it is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShootingMethod {
    SingleShooting,
    MultipleShooting
}
impl Default for ShootingMethod {
    fn default() -> Self { Self::SingleShooting }
}

/// A full trajectory optimization scenario.  Loadable from json, ron or toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryProblemConfig {
    pub dynamics: ArmDynamicsConfig,
    pub num_steps: usize,
    pub dt: f64,
    pub initial_state: ArmState<f64>,
    pub target_state: ArmState<f64>,
    /// Bound on `|control|`, in N*m for a torque-controlled arm and volts with a motor.
    pub control_limit: f64,
    #[serde(default)]
    pub current_limit: Option<f64>,
    #[serde(default)]
    pub velocity_limit: Option<f64>,
    #[serde(default)]
    pub terminal_constraint: TerminalConstraint,
    #[serde(default)]
    pub objective_nodes: ObjectiveNodes,
    #[serde(default)]
    pub shooting_method: ShootingMethod,
    #[serde(default)]
    pub optimizer_type: NonlinearOptimizerType,
    #[serde(default)]
    pub optimizer_parameters: OptimizerParameters
}
impl TrajectoryProblemConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ArmoptError> {
        return load_object_from_config_file(path);
    }
    pub fn build_problem(&self) -> Result<ArmTrajectoryProblem, ArmoptError> {
        return ArmTrajectoryProblem::new(self.clone());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct TrajectoryProblemBuilder {
    dynamics: ArmDynamicsConfig,
    num_steps: usize,
    dt: f64,
    initial_state: ArmState<f64>,
    target_state: ArmState<f64>,
    control_limit: Option<f64>,
    current_limit: Option<f64>,
    velocity_limit: Option<f64>,
    terminal_constraint: TerminalConstraint,
    objective_nodes: ObjectiveNodes,
    shooting_method: ShootingMethod,
    optimizer_type: NonlinearOptimizerType,
    optimizer_parameters: OptimizerParameters
}
impl TrajectoryProblemBuilder {
    pub fn new(dynamics: ArmDynamicsConfig, num_steps: usize, dt: f64) -> Self {
        Self {
            dynamics,
            num_steps,
            dt,
            initial_state: ArmState::new_at_rest(0.0),
            target_state: ArmState::new_at_rest(0.0),
            control_limit: None,
            current_limit: None,
            velocity_limit: None,
            terminal_constraint: TerminalConstraint::default(),
            objective_nodes: ObjectiveNodes::default(),
            shooting_method: ShootingMethod::default(),
            optimizer_type: NonlinearOptimizerType::default(),
            optimizer_parameters: OptimizerParameters::default()
        }
    }
    pub fn with_initial_state(mut self, initial_state: ArmState<f64>) -> Self {
        self.initial_state = initial_state;
        self
    }
    pub fn with_target_state(mut self, target_state: ArmState<f64>) -> Self {
        self.target_state = target_state;
        self
    }
    pub fn with_control_limit(mut self, control_limit: f64) -> Self {
        self.control_limit = Some(control_limit);
        self
    }
    pub fn with_current_limit(mut self, current_limit: f64) -> Self {
        self.current_limit = Some(current_limit);
        self
    }
    pub fn with_velocity_limit(mut self, velocity_limit: f64) -> Self {
        self.velocity_limit = Some(velocity_limit);
        self
    }
    pub fn with_terminal_constraint(mut self, terminal_constraint: TerminalConstraint) -> Self {
        self.terminal_constraint = terminal_constraint;
        self
    }
    pub fn with_objective_nodes(mut self, objective_nodes: ObjectiveNodes) -> Self {
        self.objective_nodes = objective_nodes;
        self
    }
    pub fn with_shooting_method(mut self, shooting_method: ShootingMethod) -> Self {
        self.shooting_method = shooting_method;
        self
    }
    pub fn with_optimizer_type(mut self, optimizer_type: NonlinearOptimizerType) -> Self {
        self.optimizer_type = optimizer_type;
        self
    }
    pub fn with_optimizer_parameters(mut self, optimizer_parameters: OptimizerParameters) -> Self {
        self.optimizer_parameters = optimizer_parameters;
        self
    }
    pub fn build(self) -> Result<ArmTrajectoryProblem, ArmoptError> {
        let control_limit = match self.control_limit {
            None => { return Err(ArmoptError::new_configuration_error_str("a control limit must be set before building a trajectory problem.", file!(), line!())); }
            Some(c) => { c }
        };
        let config = TrajectoryProblemConfig {
            dynamics: self.dynamics,
            num_steps: self.num_steps,
            dt: self.dt,
            initial_state: self.initial_state,
            target_state: self.target_state,
            control_limit,
            current_limit: self.current_limit,
            velocity_limit: self.velocity_limit,
            terminal_constraint: self.terminal_constraint,
            objective_nodes: self.objective_nodes,
            shooting_method: self.shooting_method,
            optimizer_type: self.optimizer_type,
            optimizer_parameters: self.optimizer_parameters
        };
        return ArmTrajectoryProblem::new(config);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Positions of the state and control nodes inside the flat decision vector
/// `[angle_0..angle_N, velocity_0..velocity_N, control_0..control_{N-1}]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecisionVariableLayout {
    num_steps: usize
}
impl DecisionVariableLayout {
    pub fn new(num_steps: usize) -> Self {
        Self { num_steps }
    }
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }
    pub fn num_decision_variables(&self) -> usize {
        3 * self.num_steps + 2
    }
    pub fn angle_idx(&self, k: usize) -> usize {
        k
    }
    pub fn velocity_idx(&self, k: usize) -> usize {
        self.num_steps + 1 + k
    }
    pub fn control_idx(&self, k: usize) -> usize {
        2 * (self.num_steps + 1) + k
    }
    pub fn state_at(&self, x: &[f64], k: usize) -> ArmState<f64> {
        ArmState::new(x[self.angle_idx(k)], x[self.velocity_idx(k)])
    }
}

/// One scalar row of the constraint vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintRow {
    InitialAngle,
    InitialVelocity,
    TerminalAngle,
    TerminalVelocity,
    /// `angle[k + 1] - step(state[k], control[k]).angle`
    AngleDefect { step: usize },
    /// `velocity[k + 1] - step(state[k], control[k]).velocity`
    VelocityDefect { step: usize },
    /// Motor current drawn over step `k`.
    Current { step: usize }
}

/// Values and first derivatives of one Euler step with respect to `(angle_k, velocity_k,
/// control_k)`.
pub(crate) struct StepLinearization {
    pub(crate) next_state: ArmState<Dual<3>>,
    pub(crate) current: Option<Dual<3>>
}

/// The direct transcription of one arm motion.  Built once per solve and never mutated.
#[derive(Clone, Debug)]
pub struct ArmTrajectoryProblem {
    config: TrajectoryProblemConfig,
    propagator: DiscretePropagator,
    layout: DecisionVariableLayout,
    rows: Vec<ConstraintRow>,
    variable_bounds: (Vec<f64>, Vec<f64>),
    row_bounds: (Vec<f64>, Vec<f64>)
}
impl ArmTrajectoryProblem {
    pub fn new(config: TrajectoryProblemConfig) -> Result<Self, ArmoptError> {
        Self::validate_config(&config)?;

        let dynamics = ArmDynamics::new(config.dynamics.clone())?;
        if config.current_limit.is_some() && dynamics.motor().is_none() {
            return Err(ArmoptError::new_configuration_error_str("a current limit needs a motor in the dynamics configuration.", file!(), line!()));
        }
        let propagator = DiscretePropagator::new(dynamics, config.dt)?;
        let layout = DecisionVariableLayout::new(config.num_steps);
        let n = config.num_steps;

        let mut rows = vec![ConstraintRow::InitialAngle, ConstraintRow::InitialVelocity];
        for k in 0..n {
            rows.push(ConstraintRow::AngleDefect { step: k });
            rows.push(ConstraintRow::VelocityDefect { step: k });
        }
        if config.terminal_constraint == TerminalConstraint::FullStop {
            rows.push(ConstraintRow::TerminalAngle);
            rows.push(ConstraintRow::TerminalVelocity);
        }
        if config.current_limit.is_some() {
            for k in 0..n { rows.push(ConstraintRow::Current { step: k }); }
        }

        let mut row_lower = vec![];
        let mut row_upper = vec![];
        for row in &rows {
            let (l, u) = match row {
                ConstraintRow::InitialAngle => { (config.initial_state.angle, config.initial_state.angle) }
                ConstraintRow::InitialVelocity => { (config.initial_state.angular_velocity, config.initial_state.angular_velocity) }
                ConstraintRow::TerminalAngle => { (config.target_state.angle, config.target_state.angle) }
                ConstraintRow::TerminalVelocity => { (config.target_state.angular_velocity, config.target_state.angular_velocity) }
                ConstraintRow::AngleDefect { .. } | ConstraintRow::VelocityDefect { .. } => { (0.0, 0.0) }
                ConstraintRow::Current { .. } => {
                    let limit = config.current_limit.unwrap_or(f64::INFINITY);
                    (-limit, limit)
                }
            };
            row_lower.push(l);
            row_upper.push(u);
        }

        let num_vars = layout.num_decision_variables();
        let mut var_lower = vec![f64::NEG_INFINITY; num_vars];
        let mut var_upper = vec![f64::INFINITY; num_vars];
        for k in 0..n {
            var_lower[layout.control_idx(k)] = -config.control_limit;
            var_upper[layout.control_idx(k)] = config.control_limit;
        }
        if let Some(v) = config.velocity_limit {
            for k in 0..=n {
                var_lower[layout.velocity_idx(k)] = -v;
                var_upper[layout.velocity_idx(k)] = v;
            }
        }

        Ok(Self {
            config,
            propagator,
            layout,
            rows,
            variable_bounds: (var_lower, var_upper),
            row_bounds: (row_lower, row_upper)
        })
    }
    pub fn new_from_config_file(path: &Path) -> Result<Self, ArmoptError> {
        let config = TrajectoryProblemConfig::load_from_path(path)?;
        return Self::new(config);
    }
    fn validate_config(config: &TrajectoryProblemConfig) -> Result<(), ArmoptError> {
        if config.num_steps == 0 {
            return Err(ArmoptError::new_configuration_error_str("num_steps must be at least 1.", file!(), line!()));
        }
        if !config.initial_state.is_finite() || !config.target_state.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("initial and target states must be finite, got {:?} and {:?}.", config.initial_state, config.target_state), file!(), line!()));
        }
        let limits = [("control_limit", Some(config.control_limit)), ("current_limit", config.current_limit), ("velocity_limit", config.velocity_limit)];
        for (name, limit) in limits.iter() {
            if let Some(l) = limit {
                if !(*l >= 0.0) || !l.is_finite() {
                    return Err(ArmoptError::new_configuration_error_str(&format!("{} must be non-negative and finite, got {}.", name, l), file!(), line!()));
                }
            }
        }
        Ok(())
    }
    /// Linear angle interpolation from the initial to the target angle, interior velocities at
    /// the constant interpolation slope, zero controls.
    pub fn default_initial_guess(&self) -> DVector<f64> {
        let n = self.config.num_steps;
        let mut out = DVector::zeros(self.layout.num_decision_variables());

        let angles = SimpleInterpolationUtils::linear_interpolation_scalar(self.config.initial_state.angle, self.config.target_state.angle, n + 1);
        let slope = (self.config.target_state.angle - self.config.initial_state.angle) / (n as f64 * self.config.dt);
        for k in 0..=n {
            out[self.layout.angle_idx(k)] = angles[k];
            out[self.layout.velocity_idx(k)] = if k == 0 {
                self.config.initial_state.angular_velocity
            } else if k == n {
                self.config.target_state.angular_velocity
            } else {
                slope
            };
        }

        out
    }
    pub fn decision_vector_from_trajectory(&self, trajectory: &ArmTrajectory) -> Result<DVector<f64>, ArmoptError> {
        if trajectory.num_steps() != self.config.num_steps {
            return Err(ArmoptError::new_configuration_error_str(&format!("trajectory has {} steps but the problem has {}.", trajectory.num_steps(), self.config.num_steps), file!(), line!()));
        }
        let mut out = DVector::zeros(self.layout.num_decision_variables());
        for (k, s) in trajectory.states().iter().enumerate() {
            out[self.layout.angle_idx(k)] = s.angle;
            out[self.layout.velocity_idx(k)] = s.angular_velocity;
        }
        for (k, c) in trajectory.controls().iter().enumerate() {
            out[self.layout.control_idx(k)] = *c;
        }
        Ok(out)
    }
    pub fn trajectory_from_decision_vector(&self, x: &[f64]) -> Result<ArmTrajectory, ArmoptError> {
        if x.len() != self.layout.num_decision_variables() {
            return Err(ArmoptError::new_configuration_error_str(&format!("decision vector has length {} but the problem has {} decision variables.", x.len(), self.layout.num_decision_variables()), file!(), line!()));
        }
        let n = self.config.num_steps;
        let states = (0..=n).map(|k| self.layout.state_at(x, k)).collect();
        let controls = (0..n).map(|k| x[self.layout.control_idx(k)]).collect();
        return ArmTrajectory::new(states, controls, self.config.dt, self.dynamics().control_kind());
    }
    /// Solves with the optimizer and parameters from the configuration, starting from
    /// [`Self::default_initial_guess`].
    pub fn solve(&self) -> Result<SolvedTrajectory, ArmoptError> {
        let optimizer = NonlinearOptimizer::new(self.config.optimizer_type);
        return self.solve_from(&optimizer, &self.default_initial_guess(), &self.config.optimizer_parameters);
    }
    pub fn solve_with_initial_guess(&self, initial_guess: &ArmTrajectory) -> Result<SolvedTrajectory, ArmoptError> {
        let optimizer = NonlinearOptimizer::new(self.config.optimizer_type);
        let x0 = self.decision_vector_from_trajectory(initial_guess)?;
        return self.solve_from(&optimizer, &x0, &self.config.optimizer_parameters);
    }
    /// Runs `optimizer` from `initial_guess`, a full decision vector, on the formulation picked
    /// by the configured [`ShootingMethod`].
    pub fn solve_from(&self, optimizer: &NonlinearOptimizer, initial_guess: &DVector<f64>, parameters: &OptimizerParameters) -> Result<SolvedTrajectory, ArmoptError> {
        if parameters.verbose() {
            armopt_print(&format!(">> Solving arm trajectory with {:?} ({:?})", optimizer.optimizer_type(), self.config.shooting_method), PrintMode::Println, PrintColor::Blue, true);
            armopt_print_labeled_value("   decision variables", &format!("{}", self.num_decision_variables()), PrintColor::Cyan);
            armopt_print_labeled_value("   constraint rows", &format!("{}", self.num_constraints()), PrintColor::Cyan);
        }

        let res = self.solve_from_unreported(optimizer, initial_guess, parameters);
        if let Err(e) = &res {
            if parameters.verbose() { armopt_print_warning(&e.to_string()); }
        }
        res
    }
    fn solve_from_unreported(&self, optimizer: &NonlinearOptimizer, initial_guess: &DVector<f64>, parameters: &OptimizerParameters) -> Result<SolvedTrajectory, ArmoptError> {
        if initial_guess.len() != self.num_decision_variables() {
            return Err(ArmoptError::new_configuration_error_str(&format!("initial guess has length {} but the problem has {} decision variables.", initial_guess.len(), self.num_decision_variables()), file!(), line!()));
        }

        let (x, res) = match self.config.shooting_method {
            ShootingMethod::MultipleShooting => {
                let res = optimizer.optimize(self, initial_guess, parameters)?;
                (res.x_min().clone(), res)
            }
            ShootingMethod::SingleShooting => {
                let program = SingleShootingProgram::new(self);
                let res = optimizer.optimize(&program, &program.controls_from_decision_vector(initial_guess), parameters)?;
                (program.decision_vector_from_controls(res.x_min().as_slice()), res)
            }
        };

        let max_constraint_violation = self.max_constraint_violation(x.as_slice());
        if !(max_constraint_violation <= parameters.feasibility_tolerance()) {
            let mut report = res.failure_report(&format!("trajectory violates the transcription beyond the feasibility tolerance {:e}", parameters.feasibility_tolerance()));
            report.max_constraint_violation = Some(max_constraint_violation);
            return Err(ArmoptError::new_solve_failure(report));
        }
        let trajectory = self.trajectory_from_decision_vector(x.as_slice())?;

        Ok(SolvedTrajectory::new(
            trajectory,
            self.cost(x.as_slice()),
            max_constraint_violation,
            res.exit_status_str(),
            res.num_outer_iterations(),
            res.num_inner_iterations(),
            res.solve_time()
        ))
    }
    pub(crate) fn linearize_step(&self, state: &ArmState<f64>, control: f64) -> StepLinearization {
        let state = ArmState::new(Dual::<3>::new_variable(state.angle, 0), Dual::<3>::new_variable(state.angular_velocity, 1));
        let control = Dual::<3>::new_variable(control, 2);
        StepLinearization {
            next_state: self.propagator.step(&state, control),
            current: self.propagator.dynamics().control_current(&state, control)
        }
    }
    fn step_linearizations(&self, x: &[f64]) -> Vec<StepLinearization> {
        (0..self.config.num_steps).map(|k| self.linearize_step(&self.layout.state_at(x, k), x[self.layout.control_idx(k)])).collect()
    }
    /// `step(state[k], control[k])` for every step, with the states read from `x`.
    fn predicted_states(&self, x: &[f64]) -> Vec<ArmState<f64>> {
        (0..self.config.num_steps).map(|k| self.propagator.step(&self.layout.state_at(x, k), x[self.layout.control_idx(k)])).collect()
    }
    pub(crate) fn is_objective_node(&self, k: usize) -> bool {
        return match self.config.objective_nodes {
            ObjectiveNodes::AllStates => { true }
            ObjectiveNodes::ExcludeTerminal => { k < self.config.num_steps }
        }
    }
    pub fn config(&self) -> &TrajectoryProblemConfig {
        &self.config
    }
    pub fn dynamics(&self) -> &ArmDynamics {
        self.propagator.dynamics()
    }
    pub fn propagator(&self) -> &DiscretePropagator {
        &self.propagator
    }
    pub fn layout(&self) -> &DecisionVariableLayout {
        &self.layout
    }
    pub fn rows(&self) -> &Vec<ConstraintRow> {
        &self.rows
    }
    pub fn print_summary(&self) {
        armopt_print(">> Arm trajectory problem", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   steps / dt", &format!("{} / {} s", self.config.num_steps, self.config.dt), PrintColor::Cyan);
        armopt_print_labeled_value("   initial state", &format!("{:?}", self.config.initial_state), PrintColor::Cyan);
        armopt_print_labeled_value("   target state", &format!("{:?}", self.config.target_state), PrintColor::Cyan);
        armopt_print_labeled_value("   control limit", &format!("{} {}", self.config.control_limit, self.dynamics().control_kind().unit_str()), PrintColor::Cyan);
        if let Some(c) = self.config.current_limit { armopt_print_labeled_value("   current limit", &format!("{} A", c), PrintColor::Cyan); }
        if let Some(v) = self.config.velocity_limit { armopt_print_labeled_value("   velocity limit", &format!("{} rad/s", v), PrintColor::Cyan); }
        armopt_print_labeled_value("   terminal constraint", &format!("{:?}", self.config.terminal_constraint), PrintColor::Cyan);
        armopt_print_labeled_value("   objective nodes", &format!("{:?}", self.config.objective_nodes), PrintColor::Cyan);
        self.dynamics().print_summary();
    }
}
impl NonlinearProgram for ArmTrajectoryProblem {
    fn num_decision_variables(&self) -> usize {
        self.layout.num_decision_variables()
    }
    fn num_constraints(&self) -> usize {
        self.rows.len()
    }
    fn decision_variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.variable_bounds.clone()
    }
    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.row_bounds.clone()
    }
    fn cost(&self, x: &[f64]) -> f64 {
        let target = self.config.target_state.angle;
        let mut out = 0.0;
        for k in 0..=self.config.num_steps {
            if !self.is_objective_node(k) { continue; }
            let e = target - x[self.layout.angle_idx(k)];
            out += e * e;
        }
        out
    }
    fn cost_gradient(&self, x: &[f64], grad: &mut [f64]) {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let target = self.config.target_state.angle;
        for k in 0..=self.config.num_steps {
            if !self.is_objective_node(k) { continue; }
            let idx = self.layout.angle_idx(k);
            grad[idx] = -2.0 * (target - x[idx]);
        }
    }
    fn constraints(&self, x: &[f64], out: &mut [f64]) {
        let dynamics = self.propagator.dynamics();
        let n = self.config.num_steps;
        let predicted = self.predicted_states(x);
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = match row {
                ConstraintRow::InitialAngle => { x[self.layout.angle_idx(0)] }
                ConstraintRow::InitialVelocity => { x[self.layout.velocity_idx(0)] }
                ConstraintRow::TerminalAngle => { x[self.layout.angle_idx(n)] }
                ConstraintRow::TerminalVelocity => { x[self.layout.velocity_idx(n)] }
                ConstraintRow::AngleDefect { step } => { x[self.layout.angle_idx(step + 1)] - predicted[*step].angle }
                ConstraintRow::VelocityDefect { step } => { x[self.layout.velocity_idx(step + 1)] - predicted[*step].angular_velocity }
                ConstraintRow::Current { step } => {
                    dynamics.control_current(&self.layout.state_at(x, *step), x[self.layout.control_idx(*step)]).unwrap_or(0.0)
                }
            };
        }
    }
    fn constraint_jacobian_transpose_product(&self, x: &[f64], d: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|o| *o = 0.0);
        let linearizations = self.step_linearizations(x);
        let n = self.config.num_steps;

        for (i, row) in self.rows.iter().enumerate() {
            let di = d[i];
            if di == 0.0 { continue; }
            match row {
                ConstraintRow::InitialAngle => { out[self.layout.angle_idx(0)] += di; }
                ConstraintRow::InitialVelocity => { out[self.layout.velocity_idx(0)] += di; }
                ConstraintRow::TerminalAngle => { out[self.layout.angle_idx(n)] += di; }
                ConstraintRow::TerminalVelocity => { out[self.layout.velocity_idx(n)] += di; }
                ConstraintRow::AngleDefect { step } => {
                    let k = *step;
                    let next = &linearizations[k].next_state.angle;
                    out[self.layout.angle_idx(k + 1)] += di;
                    self.add_local_partials(out, k, next, -di);
                }
                ConstraintRow::VelocityDefect { step } => {
                    let k = *step;
                    let next = &linearizations[k].next_state.angular_velocity;
                    out[self.layout.velocity_idx(k + 1)] += di;
                    self.add_local_partials(out, k, next, -di);
                }
                ConstraintRow::Current { step } => {
                    if let Some(current) = &linearizations[*step].current {
                        self.add_local_partials(out, *step, current, di);
                    }
                }
            }
        }
    }
}
impl ArmTrajectoryProblem {
    /// Scatters `scale * d(value)/d(angle_k, velocity_k, control_k)` into `out`.
    fn add_local_partials(&self, out: &mut [f64], k: usize, value: &Dual<3>, scale: f64) {
        out[self.layout.angle_idx(k)] += scale * value.partial(0);
        out[self.layout.velocity_idx(k)] += scale * value.partial(1);
        out[self.layout.control_idx(k)] += scale * value.partial(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::arm_modules::arm_motor_module::MotorParameters;
    use crate::utils::utils_math::finite_difference::FiniteDifferenceUtils;

    fn torque_problem(num_steps: usize) -> ArmTrajectoryProblem {
        TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 3.0), num_steps, 0.05)
            .with_initial_state(ArmState::new_at_rest(-1.0))
            .with_target_state(ArmState::new_at_rest(0.5))
            .with_control_limit(20.0)
            .build()
            .unwrap()
    }

    fn voltage_problem(num_steps: usize) -> ArmTrajectoryProblem {
        let motor = MotorParameters::kraken_x60_foc().with_reduction(50.0).unwrap();
        TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0).with_motor(motor), num_steps, 0.005)
            .with_initial_state(ArmState::new_at_rest(-PI / 2.0))
            .with_target_state(ArmState::new_at_rest(0.0))
            .with_control_limit(12.0)
            .with_current_limit(480.0)
            .build()
            .unwrap()
    }

    fn sample_point(problem: &ArmTrajectoryProblem) -> Vec<f64> {
        let n = problem.num_decision_variables();
        (0..n).map(|i| 0.3 * ((i as f64) * 0.7).sin() + 0.1 * (i % 5) as f64).collect()
    }

    #[test]
    fn layout_indices_partition_the_decision_vector() {
        let layout = DecisionVariableLayout::new(4);
        assert_eq!(layout.num_decision_variables(), 14);
        assert_eq!(layout.angle_idx(4), 4);
        assert_eq!(layout.velocity_idx(0), 5);
        assert_eq!(layout.velocity_idx(4), 9);
        assert_eq!(layout.control_idx(0), 10);
        assert_eq!(layout.control_idx(3), 13);
    }

    #[test]
    fn rows_and_bounds_follow_the_configuration() {
        let p = torque_problem(10);
        assert_eq!(p.num_constraints(), 2 + 20 + 2);
        let (l, u) = p.constraint_bounds();
        assert_eq!((l[0], u[0]), (-1.0, -1.0));
        assert_eq!((l[22], u[22]), (0.5, 0.5));
        let (vl, vu) = p.decision_variable_bounds();
        assert_eq!(vl[p.layout().control_idx(3)], -20.0);
        assert_eq!(vu[p.layout().control_idx(3)], 20.0);
        assert_eq!(vu[p.layout().angle_idx(3)], f64::INFINITY);

        let v = voltage_problem(10);
        assert_eq!(v.num_constraints(), 2 + 20 + 2 + 10);
        let (l, u) = v.constraint_bounds();
        assert_eq!((l[33], u[33]), (-480.0, 480.0));
    }

    #[test]
    fn build_rejects_bad_configurations() {
        let base = || TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0), 10, 0.05);
        assert!(base().build().unwrap_err().is_configuration_error());
        assert!(base().with_control_limit(-1.0).build().is_err());
        assert!(base().with_control_limit(f64::NAN).build().is_err());
        assert!(base().with_control_limit(1.0).with_current_limit(10.0).build().is_err());
        assert!(base().with_control_limit(1.0).with_initial_state(ArmState::new(f64::INFINITY, 0.0)).build().is_err());
        assert!(TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0), 0, 0.05).with_control_limit(1.0).build().is_err());
        assert!(TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0), 10, 0.0).with_control_limit(1.0).build().is_err());
        assert!(base().with_control_limit(0.0).build().is_ok());
    }

    #[test]
    fn default_guess_interpolates_the_boundary_states() {
        let p = torque_problem(4);
        let x = p.default_initial_guess();
        let t = p.trajectory_from_decision_vector(x.as_slice()).unwrap();
        assert_eq!(t.angles()[0], -1.0);
        assert!((t.angles()[2] + 0.25).abs() < 1e-12);
        assert_eq!(t.angles()[4], 0.5);
        assert_eq!(t.velocities()[0], 0.0);
        assert!((t.velocities()[1] - 1.5 / 0.2).abs() < 1e-12);
        assert_eq!(t.velocities()[4], 0.0);
        assert!(t.controls().iter().all(|c| *c == 0.0));
        assert_eq!(p.decision_vector_from_trajectory(&t).unwrap(), x);
    }

    #[test]
    fn rollout_of_controls_satisfies_every_defect_row() {
        let p = torque_problem(6);
        let controls = vec![5.0, -3.0, 20.0, 0.0, 1.0, -7.0];
        let states = p.propagator().rollout(&ArmState::new_at_rest(-1.0), &controls);
        let t = ArmTrajectory::new(states, controls, 0.05, p.dynamics().control_kind()).unwrap();
        let x = p.decision_vector_from_trajectory(&t).unwrap();

        let mut g = vec![0.0; p.num_constraints()];
        p.constraints(x.as_slice(), &mut g);
        for (i, row) in p.rows().iter().enumerate() {
            match row {
                ConstraintRow::AngleDefect { .. } | ConstraintRow::VelocityDefect { .. } => { assert!(g[i].abs() < 1e-12); }
                _ => {}
            }
        }
        // only the terminal rows are violated by an arbitrary rollout
        assert!(p.max_constraint_violation(x.as_slice()) > 0.0);
    }

    #[test]
    fn defect_rows_compare_each_node_with_one_step() {
        let p = voltage_problem(4);
        let x = sample_point(&p);
        let mut g = vec![0.0; p.num_constraints()];
        p.constraints(&x, &mut g);
        for (i, row) in p.rows().iter().enumerate() {
            let expected = match row {
                ConstraintRow::AngleDefect { step } => { x[p.layout().angle_idx(step + 1)] - p.propagator().step(&p.layout().state_at(&x, *step), x[p.layout().control_idx(*step)]).angle }
                ConstraintRow::VelocityDefect { step } => { x[p.layout().velocity_idx(step + 1)] - p.propagator().step(&p.layout().state_at(&x, *step), x[p.layout().control_idx(*step)]).angular_velocity }
                ConstraintRow::Current { step } => { p.dynamics().control_current(&p.layout().state_at(&x, *step), x[p.layout().control_idx(*step)]).unwrap() }
                _ => { continue; }
            };
            assert_eq!(g[i], expected, "row {:?}", row);
        }
    }

    fn check_jacobian(problem: &ArmTrajectoryProblem) {
        let x = sample_point(problem);
        let m = problem.num_constraints();
        let n = problem.num_decision_variables();
        let numeric = FiniteDifferenceUtils::central_difference_jacobian(|u: &[f64], out: &mut [f64]| problem.constraints(u, out), m, &x, None);

        for i in 0..m {
            let mut d = vec![0.0; m];
            d[i] = 1.0;
            let mut row = vec![0.0; n];
            problem.constraint_jacobian_transpose_product(&x, &d, &mut row);
            let scale = row.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
            for j in 0..n {
                assert!((row[j] - numeric[(i, j)]).abs() < 1e-6 * scale, "row {:?} col {}: analytic {} numeric {}", problem.rows()[i], j, row[j], numeric[(i, j)]);
            }
        }
    }

    #[test]
    fn torque_jacobian_matches_finite_difference() {
        check_jacobian(&torque_problem(5));
    }

    #[test]
    fn voltage_jacobian_matches_finite_difference() {
        check_jacobian(&voltage_problem(5));
    }

    #[test]
    fn cost_gradient_matches_finite_difference() {
        for nodes in [ObjectiveNodes::AllStates, ObjectiveNodes::ExcludeTerminal] {
            let p = TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0), 5, 0.05)
                .with_target_state(ArmState::new_at_rest(0.7))
                .with_control_limit(20.0)
                .with_objective_nodes(nodes)
                .build()
                .unwrap();
            let x = sample_point(&p);
            let mut grad = vec![0.0; p.num_decision_variables()];
            p.cost_gradient(&x, &mut grad);
            let numeric = FiniteDifferenceUtils::central_difference_gradient(|u: &[f64]| p.cost(u), &x, None);
            for j in 0..x.len() {
                assert!((grad[j] - numeric[j]).abs() < 1e-5, "col {}: analytic {} numeric {}", j, grad[j], numeric[j]);
            }
        }
    }

    #[test]
    fn excluding_the_terminal_node_drops_its_cost() {
        let all = torque_problem(3);
        let mut config = all.config().clone();
        config.objective_nodes = ObjectiveNodes::ExcludeTerminal;
        let partial = config.build_problem().unwrap();
        let x = sample_point(&all);
        let e = 0.5 - x[all.layout().angle_idx(3)];
        assert!((all.cost(&x) - partial.cost(&x) - e * e).abs() < 1e-12);
    }

    #[test]
    fn config_loads_from_ron() {
        let s = r#"(
            dynamics: (
                gravity_model: PointMass(mass: 2.0, lever_arm: 1.0),
            ),
            num_steps: 100,
            dt: 0.05,
            initial_state: (angle: -6.283185307179586, angular_velocity: 0.0),
            target_state: (angle: 0.0, angular_velocity: 0.0),
            control_limit: 20.0,
        )"#;
        let config: TrajectoryProblemConfig = ron::from_str(s).unwrap();
        assert_eq!(config.terminal_constraint, TerminalConstraint::FullStop);
        assert_eq!(config.objective_nodes, ObjectiveNodes::AllStates);
        assert_eq!(config.shooting_method, ShootingMethod::SingleShooting);
        assert_eq!(config.dynamics.gravity, -9.81);
        let p = config.build_problem().unwrap();
        assert_eq!(p.num_decision_variables(), 302);
    }
}
