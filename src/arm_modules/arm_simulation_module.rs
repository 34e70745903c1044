//! Forward integration of the arm dynamics without any optimization.  This is a validation
//! tool: it consumes nothing but [`ArmDynamics::derivative`].

use serde::{Serialize, Deserialize};
use crate::arm_modules::arm_dynamics_module::{ArmDynamics, ArmDynamicsConfig, ArmState};
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;

#[derive(Clone, Debug)]
pub struct ArmSimulator {
    dynamics: ArmDynamics,
    integration_step: f64
}
impl ArmSimulator {
    pub fn new(dynamics: ArmDynamics, integration_step: f64) -> Result<Self, ArmoptError> {
        if !(integration_step > 0.0) || !integration_step.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("integration step must be strictly positive and finite, got {}.", integration_step), file!(), line!()));
        }
        Ok(Self { dynamics, integration_step })
    }
    pub fn new_from_config(config: &ArmSimulationConfig) -> Result<Self, ArmoptError> {
        return Self::new(ArmDynamics::new(config.dynamics.clone())?, config.integration_step);
    }
    /// One classic fourth-order Runge-Kutta step with the control held constant.
    pub fn rk4_step(&self, state: &ArmState<f64>, control: f64, h: f64) -> ArmState<f64> {
        let f = |s: &ArmState<f64>| {
            let d = self.dynamics.derivative(s, control);
            (d.d_angle, d.d_angular_velocity)
        };
        let k1 = f(state);
        let k2 = f(&ArmState::new(state.angle + 0.5 * h * k1.0, state.angular_velocity + 0.5 * h * k1.1));
        let k3 = f(&ArmState::new(state.angle + 0.5 * h * k2.0, state.angular_velocity + 0.5 * h * k2.1));
        let k4 = f(&ArmState::new(state.angle + h * k3.0, state.angular_velocity + h * k3.1));

        return ArmState::new(
            state.angle + h / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0),
            state.angular_velocity + h / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1)
        );
    }
    /// Integrates over `[0, duration]` with the control given as a function of time and state.
    /// The last step is shortened so that the final sample lands exactly on `duration`.
    pub fn simulate<F>(&self, initial_state: &ArmState<f64>, duration: f64, control: F) -> Result<SimulationResult, ArmoptError>
        where F: Fn(f64, &ArmState<f64>) -> f64 {
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("simulation duration must be non-negative and finite, got {}.", duration), file!(), line!()));
        }

        let mut times = vec![0.0];
        let mut states = vec![*initial_state];
        let mut t = 0.0;
        let mut curr_state = *initial_state;
        while duration - t > 1e-12 {
            let h = self.integration_step.min(duration - t);
            let u = control(t, &curr_state);
            curr_state = self.rk4_step(&curr_state, u, h);
            t += h;
            times.push(t);
            states.push(curr_state);
        }

        Ok(SimulationResult { times, states })
    }
    pub fn simulate_constant_control(&self, initial_state: &ArmState<f64>, duration: f64, control: f64) -> Result<SimulationResult, ArmoptError> {
        return self.simulate(initial_state, duration, |_, _| control);
    }
    /// Replays a control sequence under zero-order hold, `control_dt` seconds per sample.
    pub fn simulate_zero_order_hold(&self, initial_state: &ArmState<f64>, controls: &[f64], control_dt: f64) -> Result<SimulationResult, ArmoptError> {
        if !(control_dt > 0.0) || !control_dt.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("control_dt must be strictly positive and finite, got {}.", control_dt), file!(), line!()));
        }
        let duration = control_dt * controls.len() as f64;
        return self.simulate(initial_state, duration, |t, _| {
            if controls.is_empty() { return 0.0; }
            let idx = ((t / control_dt) + 1e-9).floor() as usize;
            controls[idx.min(controls.len() - 1)]
        });
    }
    pub fn dynamics(&self) -> &ArmDynamics {
        &self.dynamics
    }
    pub fn integration_step(&self) -> f64 {
        self.integration_step
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationResult {
    times: Vec<f64>,
    states: Vec<ArmState<f64>>
}
impl SimulationResult {
    pub fn times(&self) -> &Vec<f64> {
        &self.times
    }
    pub fn states(&self) -> &Vec<ArmState<f64>> {
        &self.states
    }
    pub fn angles(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.angle).collect()
    }
    pub fn velocities(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.angular_velocity).collect()
    }
    pub fn final_state(&self) -> &ArmState<f64> {
        // never empty: the initial state is always recorded
        &self.states[self.states.len() - 1]
    }
    pub fn print_summary(&self) {
        armopt_print(">> Simulation result", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   num samples", &format!("{}", self.states.len()), PrintColor::Cyan);
        armopt_print_labeled_value("   final time", &format!("{:.4} s", self.times[self.times.len() - 1]), PrintColor::Cyan);
        let f = self.final_state();
        armopt_print_labeled_value("   final state", &format!("angle {:.4} rad, velocity {:.4} rad/s", f.angle, f.angular_velocity), PrintColor::Cyan);
    }
}

/// A forward simulation scenario, loadable from a config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArmSimulationConfig {
    pub dynamics: ArmDynamicsConfig,
    pub initial_state: ArmState<f64>,
    pub duration: f64,
    #[serde(default = "ArmSimulationConfig::default_integration_step")]
    pub integration_step: f64,
    /// Torque or voltage held for the whole run.
    #[serde(default)]
    pub constant_control: f64
}
impl ArmSimulationConfig {
    pub fn default_integration_step() -> f64 { 0.001 }
    pub fn run(&self) -> Result<SimulationResult, ArmoptError> {
        let simulator = ArmSimulator::new_from_config(self)?;
        return simulator.simulate_constant_control(&self.initial_state, self.duration, self.constant_control);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::arm_modules::arm_propagator_module::DiscretePropagator;

    fn undamped() -> ArmDynamics {
        ArmDynamics::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0)).unwrap()
    }

    #[test]
    fn undamped_swing_conserves_energy() {
        let dynamics = undamped();
        let simulator = ArmSimulator::new(dynamics.clone(), 0.001).unwrap();
        let initial = ArmState::new_at_rest(0.0);
        let res = simulator.simulate_constant_control(&initial, 5.0, 0.0).unwrap();
        let e0 = dynamics.mechanical_energy(&initial);
        for s in res.states() {
            assert!((dynamics.mechanical_energy(s) - e0).abs() < 1e-6);
        }
        // released from horizontal it swings through the bottom to the other horizontal
        let min_angle = res.angles().iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((min_angle + PI).abs() < 1e-3);
    }

    #[test]
    fn final_sample_lands_on_duration() {
        let simulator = ArmSimulator::new(undamped(), 0.003).unwrap();
        let res = simulator.simulate_constant_control(&ArmState::new_at_rest(0.2), 0.01, 0.0).unwrap();
        assert!((res.times()[res.times().len() - 1] - 0.01).abs() < 1e-12);
        assert_eq!(res.times().len(), res.states().len());
    }

    #[test]
    fn damped_arm_settles_hanging_down() {
        let dynamics = ArmDynamics::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 3.0)).unwrap();
        let simulator = ArmSimulator::new(dynamics, 0.002).unwrap();
        let res = simulator.simulate_constant_control(&ArmState::new_at_rest(0.0), 25.0, 0.0).unwrap();
        let f = res.final_state();
        assert!((f.angle + PI / 2.0).abs() < 1e-3);
        assert!(f.angular_velocity.abs() < 1e-3);
    }

    #[test]
    fn fine_euler_rollout_tracks_rk4() {
        let dynamics = ArmDynamics::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.5)).unwrap();
        let controls = vec![4.0; 200];
        let euler = DiscretePropagator::new(dynamics.clone(), 0.0005).unwrap().rollout(&ArmState::new_at_rest(-1.0), &controls);
        let rk4 = ArmSimulator::new(dynamics, 0.0005).unwrap().simulate_zero_order_hold(&ArmState::new_at_rest(-1.0), &controls, 0.0005).unwrap();
        let a = euler[euler.len() - 1];
        let b = rk4.final_state();
        assert!((a.angle - b.angle).abs() < 1e-3);
        assert!((a.angular_velocity - b.angular_velocity).abs() < 1e-3);
    }

    #[test]
    fn config_runs_from_toml() {
        let s = r#"
            duration = 1.0
            integration_step = 0.01
            constant_control = 19.62

            [initial_state]
            angle = 0.0
            angular_velocity = 0.0

            [dynamics]
            friction_coefficient = 0.0
            gravity_model = { PointMass = { mass = 2.0, lever_arm = 1.0 } }
        "#;
        let config: ArmSimulationConfig = toml::from_str(s).unwrap();
        let res = config.run().unwrap();
        // holding torque m*g*l keeps the lever horizontal
        assert!(res.final_state().angle.abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_steps() {
        assert!(ArmSimulator::new(undamped(), 0.0).is_err());
        let s = ArmSimulator::new(undamped(), 0.01).unwrap();
        assert!(s.simulate_constant_control(&ArmState::new_at_rest(0.0), -1.0, 0.0).is_err());
        assert!(s.simulate_zero_order_hold(&ArmState::new_at_rest(0.0), &[1.0], 0.0).is_err());
    }
}
