use crate::arm_modules::arm_dynamics_module::{ArmDynamics, ArmState};
use crate::utils::utils_autodiff::ArmScalar;
use crate::utils::utils_errors::ArmoptError;

/// Fixed-step explicit Euler discretization of [`ArmDynamics`].  Each step is a closed-form
/// algebraic expression of the previous state and control, which is what the defect
/// constraints of the trajectory problem are made of.
#[derive(Clone, Debug)]
pub struct DiscretePropagator {
    dynamics: ArmDynamics,
    dt: f64
}
impl DiscretePropagator {
    pub fn new(dynamics: ArmDynamics, dt: f64) -> Result<Self, ArmoptError> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("time step dt must be strictly positive and finite, got {}.", dt), file!(), line!()));
        }
        Ok(Self { dynamics, dt })
    }
    pub fn step<S: ArmScalar>(&self, state: &ArmState<S>, control: S) -> ArmState<S> {
        let d = self.dynamics.derivative(state, control);
        return ArmState::new(state.angle + d.d_angle * self.dt, state.angular_velocity + d.d_angular_velocity * self.dt);
    }
    /// Applies [`Self::step`] once per control; returns `controls.len() + 1` states.
    pub fn rollout(&self, initial_state: &ArmState<f64>, controls: &[f64]) -> Vec<ArmState<f64>> {
        let mut out_vec = Vec::with_capacity(controls.len() + 1);
        let mut curr_state = *initial_state;
        out_vec.push(curr_state);
        for c in controls {
            curr_state = self.step(&curr_state, *c);
            out_vec.push(curr_state);
        }
        out_vec
    }
    pub fn dynamics(&self) -> &ArmDynamics {
        &self.dynamics
    }
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_modules::arm_dynamics_module::ArmDynamicsConfig;

    fn propagator(dt: f64) -> Result<DiscretePropagator, ArmoptError> {
        DiscretePropagator::new(ArmDynamics::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 3.0))?, dt)
    }

    #[test]
    fn step_matches_closed_form_euler() {
        let p = propagator(0.05).unwrap();
        let state = ArmState::new(0.3, -1.2);
        let control = 7.0;
        let next = p.step(&state, control);

        let d_velocity = (-9.81 / 1.0) * 0.3_f64.cos() - 3.0 * (-1.2) + 7.0 / 2.0;
        assert!((next.angle - (0.3 + (-1.2) * 0.05)).abs() < 1e-14);
        assert!((next.angular_velocity - (-1.2 + d_velocity * 0.05)).abs() < 1e-12);
    }

    #[test]
    fn step_is_linear_in_dt() {
        let state = ArmState::new(-0.8, 0.6);
        let a = propagator(0.01).unwrap().step(&state, 2.0);
        let b = propagator(0.02).unwrap().step(&state, 2.0);
        assert!(((b.angle - state.angle) - 2.0 * (a.angle - state.angle)).abs() < 1e-12);
        assert!(((b.angular_velocity - state.angular_velocity) - 2.0 * (a.angular_velocity - state.angular_velocity)).abs() < 1e-12);
    }

    #[test]
    fn rollout_length_and_consistency() {
        let p = propagator(0.01).unwrap();
        let controls = vec![1.0, -2.0, 0.5, 0.0];
        let states = p.rollout(&ArmState::new_at_rest(-1.0), &controls);
        assert_eq!(states.len(), 5);
        for k in 0..controls.len() {
            assert_eq!(states[k + 1], p.step(&states[k], controls[k]));
        }
    }

    #[test]
    fn rejects_non_positive_dt() {
        assert!(propagator(0.0).unwrap_err().is_configuration_error());
        assert!(propagator(-0.01).is_err());
        assert!(propagator(f64::NAN).is_err());
    }
}
