//! Condensed form of an [`ArmTrajectoryProblem`].  Only the `N` controls are decision
//! variables; the states are what the propagator produces from the initial state, so the
//! initial and defect rows of the transcription are satisfied exactly and never reach the
//! solver.  What is left are the terminal rows, the current rows, and (when a velocity limit is
//! set) one velocity row per state node after the first.
//!
//! Derivatives come from one forward pass that linearizes every step with dual numbers and one
//! reverse (adjoint) pass over those local Jacobians.

use nalgebra::DVector;
use crate::arm_modules::arm_dynamics_module::ArmState;
use crate::nonlinear_optimization::NonlinearProgram;
use crate::trajectory_optimization::trajectory_problem::{ArmTrajectoryProblem, StepLinearization, TerminalConstraint};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShootingRow {
    TerminalAngle,
    TerminalVelocity,
    /// Motor current drawn over step `k`.
    Current { step: usize },
    /// Angular velocity of state node `k`.
    Velocity { node: usize }
}

pub struct SingleShootingProgram<'a> {
    problem: &'a ArmTrajectoryProblem,
    rows: Vec<ShootingRow>,
    row_bounds: (Vec<f64>, Vec<f64>)
}
impl<'a> SingleShootingProgram<'a> {
    pub fn new(problem: &'a ArmTrajectoryProblem) -> Self {
        let config = problem.config();
        let n = config.num_steps;

        let mut rows = vec![];
        let mut row_lower = vec![];
        let mut row_upper = vec![];
        if config.terminal_constraint == TerminalConstraint::FullStop {
            rows.push(ShootingRow::TerminalAngle);
            row_lower.push(config.target_state.angle);
            row_upper.push(config.target_state.angle);
            rows.push(ShootingRow::TerminalVelocity);
            row_lower.push(config.target_state.angular_velocity);
            row_upper.push(config.target_state.angular_velocity);
        }
        if let Some(limit) = config.current_limit {
            for k in 0..n {
                rows.push(ShootingRow::Current { step: k });
                row_lower.push(-limit);
                row_upper.push(limit);
            }
        }
        if let Some(limit) = config.velocity_limit {
            for k in 1..=n {
                rows.push(ShootingRow::Velocity { node: k });
                row_lower.push(-limit);
                row_upper.push(limit);
            }
        }

        Self { problem, rows, row_bounds: (row_lower, row_upper) }
    }
    pub fn problem(&self) -> &ArmTrajectoryProblem {
        self.problem
    }
    pub fn rows(&self) -> &Vec<ShootingRow> {
        &self.rows
    }
    /// The control part of a full decision vector, clamped into the control box.
    pub fn controls_from_decision_vector(&self, x: &DVector<f64>) -> DVector<f64> {
        let limit = self.problem.config().control_limit;
        let layout = self.problem.layout();
        DVector::from_fn(layout.num_steps(), |k, _| x[layout.control_idx(k)].max(-limit).min(limit))
    }
    /// Rolls `controls` out from the initial state and packs states and controls into a full
    /// decision vector of the transcription.
    pub fn decision_vector_from_controls(&self, controls: &[f64]) -> DVector<f64> {
        let layout = self.problem.layout();
        let states = self.rollout(controls);
        let mut out = DVector::zeros(layout.num_decision_variables());
        for (k, s) in states.iter().enumerate() {
            out[layout.angle_idx(k)] = s.angle;
            out[layout.velocity_idx(k)] = s.angular_velocity;
        }
        for (k, c) in controls.iter().enumerate() {
            out[layout.control_idx(k)] = *c;
        }
        out
    }
    fn rollout(&self, controls: &[f64]) -> Vec<ArmState<f64>> {
        self.problem.propagator().rollout(&self.problem.config().initial_state, controls)
    }
    fn linearized_rollout(&self, controls: &[f64]) -> (Vec<ArmState<f64>>, Vec<StepLinearization>) {
        let mut states = Vec::with_capacity(controls.len() + 1);
        let mut linearizations = Vec::with_capacity(controls.len());
        let mut curr_state = self.problem.config().initial_state;
        states.push(curr_state);
        for c in controls {
            let l = self.problem.linearize_step(&curr_state, *c);
            curr_state = l.next_state.to_concrete();
            states.push(curr_state);
            linearizations.push(l);
        }
        (states, linearizations)
    }
    /// Gradient with respect to the controls of a scalar `sum_k seed_k . state[k] +
    /// sum_k current_seed_k * current_k`, where `state_seeds[k]` is `(d/d angle_k, d/d velocity_k)`.
    fn reverse_sweep(linearizations: &[StepLinearization], state_seeds: &[(f64, f64)], current_seeds: &[f64], out: &mut [f64]) {
        let n = linearizations.len();
        let mut adjoint = state_seeds[n];
        for k in (0..n).rev() {
            let next = &linearizations[k].next_state;
            let mut d_control = adjoint.0 * next.angle.partial(2) + adjoint.1 * next.angular_velocity.partial(2);
            let mut d_angle = state_seeds[k].0 + adjoint.0 * next.angle.partial(0) + adjoint.1 * next.angular_velocity.partial(0);
            let mut d_velocity = state_seeds[k].1 + adjoint.0 * next.angle.partial(1) + adjoint.1 * next.angular_velocity.partial(1);
            if let Some(current) = &linearizations[k].current {
                let w = current_seeds[k];
                d_control += w * current.partial(2);
                d_angle += w * current.partial(0);
                d_velocity += w * current.partial(1);
            }
            out[k] = d_control;
            adjoint = (d_angle, d_velocity);
        }
    }
}
impl<'a> NonlinearProgram for SingleShootingProgram<'a> {
    fn num_decision_variables(&self) -> usize {
        self.problem.config().num_steps
    }
    fn num_constraints(&self) -> usize {
        self.rows.len()
    }
    fn decision_variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.problem.config().num_steps;
        let limit = self.problem.config().control_limit;
        (vec![-limit; n], vec![limit; n])
    }
    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.row_bounds.clone()
    }
    fn cost(&self, x: &[f64]) -> f64 {
        let target = self.problem.config().target_state.angle;
        let mut out = 0.0;
        for (k, s) in self.rollout(x).iter().enumerate() {
            if !self.problem.is_objective_node(k) { continue; }
            let e = target - s.angle;
            out += e * e;
        }
        out
    }
    fn cost_gradient(&self, x: &[f64], grad: &mut [f64]) {
        let target = self.problem.config().target_state.angle;
        let (states, linearizations) = self.linearized_rollout(x);
        let state_seeds: Vec<(f64, f64)> = states.iter().enumerate().map(|(k, s)| {
            if self.problem.is_objective_node(k) { (-2.0 * (target - s.angle), 0.0) } else { (0.0, 0.0) }
        }).collect();
        Self::reverse_sweep(&linearizations, &state_seeds, &vec![0.0; x.len()], grad);
    }
    fn constraints(&self, x: &[f64], out: &mut [f64]) {
        let dynamics = self.problem.dynamics();
        let states = self.rollout(x);
        let n = x.len();
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = match row {
                ShootingRow::TerminalAngle => { states[n].angle }
                ShootingRow::TerminalVelocity => { states[n].angular_velocity }
                ShootingRow::Current { step } => { dynamics.control_current(&states[*step], x[*step]).unwrap_or(0.0) }
                ShootingRow::Velocity { node } => { states[*node].angular_velocity }
            };
        }
    }
    fn constraint_jacobian_transpose_product(&self, x: &[f64], d: &[f64], out: &mut [f64]) {
        let n = x.len();
        let (_, linearizations) = self.linearized_rollout(x);
        let mut state_seeds = vec![(0.0, 0.0); n + 1];
        let mut current_seeds = vec![0.0; n];
        for (i, row) in self.rows.iter().enumerate() {
            match row {
                ShootingRow::TerminalAngle => { state_seeds[n].0 += d[i]; }
                ShootingRow::TerminalVelocity => { state_seeds[n].1 += d[i]; }
                ShootingRow::Current { step } => { current_seeds[*step] += d[i]; }
                ShootingRow::Velocity { node } => { state_seeds[*node].1 += d[i]; }
            }
        }
        Self::reverse_sweep(&linearizations, &state_seeds, &current_seeds, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::arm_modules::arm_dynamics_module::ArmDynamicsConfig;
    use crate::arm_modules::arm_motor_module::MotorParameters;
    use crate::trajectory_optimization::trajectory_problem::{ConstraintRow, ObjectiveNodes, TrajectoryProblemBuilder};
    use crate::utils::utils_math::finite_difference::FiniteDifferenceUtils;

    fn torque_problem(num_steps: usize) -> ArmTrajectoryProblem {
        TrajectoryProblemBuilder::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.5), num_steps, 0.05)
            .with_initial_state(ArmState::new(-1.0, 0.3))
            .with_target_state(ArmState::new_at_rest(0.5))
            .with_control_limit(20.0)
            .with_velocity_limit(4.0)
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
            .with_objective_nodes(ObjectiveNodes::ExcludeTerminal)
            .build()
            .unwrap()
    }

    fn sample_controls(program: &SingleShootingProgram) -> Vec<f64> {
        let limit = program.problem().config().control_limit;
        (0..program.num_decision_variables()).map(|k| 0.6 * limit * ((k as f64) * 0.7 + 0.3).sin()).collect()
    }

    #[test]
    fn rows_follow_the_configuration() {
        let p = torque_problem(8);
        let program = SingleShootingProgram::new(&p);
        assert_eq!(program.num_decision_variables(), 8);
        assert_eq!(program.num_constraints(), 2 + 8);
        assert_eq!(program.rows()[2], ShootingRow::Velocity { node: 1 });
        let (l, u) = program.decision_variable_bounds();
        assert!(l.iter().all(|v| *v == -20.0) && u.iter().all(|v| *v == 20.0));

        let v = voltage_problem(8);
        let program = SingleShootingProgram::new(&v);
        assert_eq!(program.num_constraints(), 2 + 8);
        let (l, u) = program.constraint_bounds();
        assert_eq!((l[0], u[0]), (0.0, 0.0));
        assert_eq!((l[9], u[9]), (-480.0, 480.0));
    }

    #[test]
    fn lifted_controls_satisfy_every_defect_row() {
        let p = torque_problem(8);
        let program = SingleShootingProgram::new(&p);
        let controls = sample_controls(&program);
        let x = program.decision_vector_from_controls(&controls);

        let mut g = vec![0.0; p.num_constraints()];
        p.constraints(x.as_slice(), &mut g);
        let (l, u) = p.constraint_bounds();
        for (i, row) in p.rows().iter().enumerate() {
            match row {
                ConstraintRow::TerminalAngle | ConstraintRow::TerminalVelocity => {}
                _ => { assert!(g[i] >= l[i] && g[i] <= u[i], "row {:?} = {}", row, g[i]); }
            }
        }
        assert_eq!(program.controls_from_decision_vector(&x).as_slice(), controls.as_slice());
        assert!((program.cost(&controls) - p.cost(x.as_slice())).abs() < 1e-12);
    }

    #[test]
    fn guess_controls_are_clamped_into_the_box() {
        let p = torque_problem(3);
        let program = SingleShootingProgram::new(&p);
        let mut x = p.default_initial_guess();
        x[p.layout().control_idx(0)] = 35.0;
        x[p.layout().control_idx(2)] = -21.0;
        let u = program.controls_from_decision_vector(&x);
        assert_eq!(u.as_slice(), &[20.0, 0.0, -20.0]);
    }

    fn check_derivatives(program: &SingleShootingProgram) {
        let x = sample_controls(program);
        let n = x.len();
        let m = program.num_constraints();

        let mut grad = vec![0.0; n];
        program.cost_gradient(&x, &mut grad);
        let numeric_grad = FiniteDifferenceUtils::central_difference_gradient(|u: &[f64]| program.cost(u), &x, None);
        for j in 0..n {
            assert!((grad[j] - numeric_grad[j]).abs() < 1e-5 * grad[j].abs().max(1.0), "cost col {}: analytic {} numeric {}", j, grad[j], numeric_grad[j]);
        }

        let numeric = FiniteDifferenceUtils::central_difference_jacobian(|u: &[f64], out: &mut [f64]| program.constraints(u, out), m, &x, None);
        for i in 0..m {
            let mut d = vec![0.0; m];
            d[i] = 1.0;
            let mut row = vec![0.0; n];
            program.constraint_jacobian_transpose_product(&x, &d, &mut row);
            let scale = row.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
            for j in 0..n {
                assert!((row[j] - numeric[(i, j)]).abs() < 1e-5 * scale, "row {:?} col {}: analytic {} numeric {}", program.rows()[i], j, row[j], numeric[(i, j)]);
            }
        }
    }

    #[test]
    fn torque_adjoint_derivatives_match_finite_difference() {
        let p = torque_problem(8);
        check_derivatives(&SingleShootingProgram::new(&p));
    }

    #[test]
    fn voltage_adjoint_derivatives_match_finite_difference() {
        let p = voltage_problem(8);
        check_derivatives(&SingleShootingProgram::new(&p));
    }
}
