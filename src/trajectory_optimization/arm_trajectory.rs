use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::arm_modules::arm_dynamics_module::{ArmDynamics, ArmState, ControlKind};
use crate::arm_modules::arm_propagator_module::DiscretePropagator;
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;
use crate::utils::utils_traits::SaveAndLoadable;

/// `N + 1` states and `N` controls sampled every `dt` seconds.  `controls[k]` is held over
/// `[k * dt, (k + 1) * dt)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArmTrajectory {
    states: Vec<ArmState<f64>>,
    controls: Vec<f64>,
    dt: f64,
    control_kind: ControlKind
}
impl ArmTrajectory {
    pub fn new(states: Vec<ArmState<f64>>, controls: Vec<f64>, dt: f64, control_kind: ControlKind) -> Result<Self, ArmoptError> {
        if controls.is_empty() {
            return Err(ArmoptError::new_configuration_error_str("a trajectory needs at least one control step.", file!(), line!()));
        }
        if states.len() != controls.len() + 1 {
            return Err(ArmoptError::new_configuration_error_str(&format!("a trajectory with {} controls needs {} states, got {}.", controls.len(), controls.len() + 1, states.len()), file!(), line!()));
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("time step dt must be strictly positive and finite, got {}.", dt), file!(), line!()));
        }
        Ok(Self { states, controls, dt, control_kind })
    }
    pub fn num_steps(&self) -> usize {
        self.controls.len()
    }
    pub fn states(&self) -> &Vec<ArmState<f64>> {
        &self.states
    }
    pub fn controls(&self) -> &Vec<f64> {
        &self.controls
    }
    pub fn dt(&self) -> f64 {
        self.dt
    }
    pub fn control_kind(&self) -> ControlKind {
        self.control_kind
    }
    pub fn initial_state(&self) -> &ArmState<f64> {
        &self.states[0]
    }
    pub fn final_state(&self) -> &ArmState<f64> {
        &self.states[self.states.len() - 1]
    }
    pub fn angles(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.angle).collect()
    }
    pub fn velocities(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.angular_velocity).collect()
    }
    /// Sample time of every state node.
    pub fn times(&self) -> Vec<f64> {
        (0..self.states.len()).map(|k| k as f64 * self.dt).collect()
    }
    pub fn duration(&self) -> f64 {
        self.dt * self.num_steps() as f64
    }
    /// Motor current drawn at each control step, or `None` for a torque-controlled arm.
    pub fn currents(&self, dynamics: &ArmDynamics) -> Option<Vec<f64>> {
        if dynamics.motor().is_none() { return None; }
        let mut out_vec = Vec::with_capacity(self.controls.len());
        for (k, c) in self.controls.iter().enumerate() {
            out_vec.push(dynamics.control_current(&self.states[k], *c)?);
        }
        Some(out_vec)
    }
    /// Torque delivered to the arm at each control step.
    pub fn torques(&self, dynamics: &ArmDynamics) -> Vec<f64> {
        self.controls.iter().enumerate().map(|(k, c)| dynamics.control_torque(&self.states[k], *c)).collect()
    }
    /// Largest component of `state[k + 1] - step(state[k], control[k])` over the horizon.
    pub fn max_dynamics_defect(&self, propagator: &DiscretePropagator) -> f64 {
        let mut out = 0.0_f64;
        for k in 0..self.controls.len() {
            let predicted = propagator.step(&self.states[k], self.controls[k]);
            out = out.max((self.states[k + 1].angle - predicted.angle).abs());
            out = out.max((self.states[k + 1].angular_velocity - predicted.angular_velocity).abs());
        }
        out
    }
    pub fn print_summary(&self) {
        let unit = self.control_kind.unit_str();
        armopt_print(">> Arm trajectory", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   steps / dt", &format!("{} / {} s ({} s total)", self.num_steps(), self.dt, self.duration()), PrintColor::Cyan);
        let i = self.initial_state();
        let f = self.final_state();
        armopt_print_labeled_value("   initial state", &format!("angle {:.4} rad, velocity {:.4} rad/s", i.angle, i.angular_velocity), PrintColor::Cyan);
        armopt_print_labeled_value("   final state", &format!("angle {:.4} rad, velocity {:.4} rad/s", f.angle, f.angular_velocity), PrintColor::Cyan);
        let max_control = self.controls.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
        armopt_print_labeled_value("   max |control|", &format!("{:.4} {}", max_control, unit), PrintColor::Cyan);
    }
}
impl SaveAndLoadable for ArmTrajectory {
    type SaveType = Self;

    fn get_save_serialization_object(&self) -> Self::SaveType {
        self.clone()
    }
    fn load_from_save_serialization_object(load: Self::SaveType) -> Result<Self, ArmoptError> where Self: Sized {
        return Self::new(load.states, load.controls, load.dt, load.control_kind);
    }
}

/// A trajectory returned by a successful solve, with the solver's account of it.
#[derive(Clone, Debug)]
pub struct SolvedTrajectory {
    trajectory: ArmTrajectory,
    cost: f64,
    max_constraint_violation: f64,
    exit_status: String,
    num_outer_iterations: usize,
    num_inner_iterations: usize,
    solve_time: Duration
}
impl SolvedTrajectory {
    pub(crate) fn new(trajectory: ArmTrajectory, cost: f64, max_constraint_violation: f64, exit_status: String, num_outer_iterations: usize, num_inner_iterations: usize, solve_time: Duration) -> Self {
        Self { trajectory, cost, max_constraint_violation, exit_status, num_outer_iterations, num_inner_iterations, solve_time }
    }
    pub fn trajectory(&self) -> &ArmTrajectory {
        &self.trajectory
    }
    pub fn into_trajectory(self) -> ArmTrajectory {
        self.trajectory
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
    pub fn max_constraint_violation(&self) -> f64 {
        self.max_constraint_violation
    }
    pub fn exit_status(&self) -> &str {
        &self.exit_status
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
    pub fn print_summary(&self) {
        armopt_print(">> Solved trajectory", PrintMode::Println, PrintColor::Green, true);
        armopt_print_labeled_value("   exit status", &self.exit_status, PrintColor::Cyan);
        armopt_print_labeled_value("   cost", &format!("{:.6}", self.cost), PrintColor::Cyan);
        armopt_print_labeled_value("   max constraint violation", &format!("{:.3e}", self.max_constraint_violation), PrintColor::Cyan);
        armopt_print_labeled_value("   outer / inner iterations", &format!("{} / {}", self.num_outer_iterations, self.num_inner_iterations), PrintColor::Cyan);
        armopt_print_labeled_value("   solve time", &format!("{:?}", self.solve_time), PrintColor::Cyan);
        self.trajectory.print_summary();
    }
}
