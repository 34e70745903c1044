use serde::{Serialize, Deserialize};
use crate::arm_modules::arm_motor_module::{MotorModel, MotorParameters};
use crate::utils::utils_autodiff::ArmScalar;
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;

/// Angle and angular velocity of the arm.  `S` is `f64` for concrete states and a dual number
/// when the state is a function of the solver's decision variables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArmState<S = f64> {
    pub angle: S,
    pub angular_velocity: S
}
impl<S: ArmScalar> ArmState<S> {
    pub fn new(angle: S, angular_velocity: S) -> Self {
        Self { angle, angular_velocity }
    }
    pub fn to_concrete(&self) -> ArmState<f64> {
        ArmState::new(self.angle.value(), self.angular_velocity.value())
    }
}
impl ArmState<f64> {
    pub fn new_at_rest(angle: f64) -> Self {
        Self::new(angle, 0.0)
    }
    pub fn is_finite(&self) -> bool {
        self.angle.is_finite() && self.angular_velocity.is_finite()
    }
}

/// Time derivative of an [`ArmState`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArmStateDerivative<S = f64> {
    pub d_angle: S,
    pub d_angular_velocity: S
}

/// A control sample.  Which variant a model accepts is fixed by its configuration
/// (see [`ArmDynamics::control_kind`]).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlInput {
    Torque(f64),
    Voltage(f64)
}
impl ControlInput {
    pub fn value(&self) -> f64 {
        match self {
            ControlInput::Torque(v) => { *v }
            ControlInput::Voltage(v) => { *v }
        }
    }
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlInput::Torque(_) => { ControlKind::Torque }
            ControlInput::Voltage(_) => { ControlKind::Voltage }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    Torque,
    Voltage
}
impl ControlKind {
    pub fn wrap(&self, value: f64) -> ControlInput {
        match self {
            ControlKind::Torque => { ControlInput::Torque(value) }
            ControlKind::Voltage => { ControlInput::Voltage(value) }
        }
    }
    pub fn unit_str(&self) -> &'static str {
        match self {
            ControlKind::Torque => { "N*m" }
            ControlKind::Voltage => { "V" }
        }
    }
}

/// How gravity and inertia enter the equation of motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GravityModel {
    /// Gravity term `(gravity / lever_arm) * trig(angle)`, effective inertia `mass * lever_arm^2`.
    PointMass { mass: f64, lever_arm: f64 },
    /// Gravity term `gravity * mass * com_distance * trig(angle) / moment_of_inertia`, effective
    /// inertia `moment_of_inertia`.
    DistributedMass { mass: f64, com_distance: f64, moment_of_inertia: f64 }
}
impl GravityModel {
    pub fn effective_inertia(&self) -> f64 {
        match self {
            GravityModel::PointMass { mass, lever_arm } => { mass * lever_arm * lever_arm }
            GravityModel::DistributedMass { moment_of_inertia, .. } => { *moment_of_inertia }
        }
    }
    /// Coefficient multiplying `trig(angle)` in the angular acceleration.
    pub fn gravity_coefficient(&self, gravity: f64) -> f64 {
        match self {
            GravityModel::PointMass { lever_arm, .. } => { gravity / lever_arm }
            GravityModel::DistributedMass { mass, com_distance, moment_of_inertia } => { gravity * mass * com_distance / moment_of_inertia }
        }
    }
    fn validate(&self) -> Result<(), ArmoptError> {
        let values = match self {
            GravityModel::PointMass { mass, lever_arm } => { vec![("mass", *mass), ("lever_arm", *lever_arm)] }
            GravityModel::DistributedMass { mass, com_distance, moment_of_inertia } => { vec![("mass", *mass), ("com_distance", *com_distance), ("moment_of_inertia", *moment_of_inertia)] }
        };
        for (name, value) in values {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ArmoptError::new_configuration_error_str(&format!("gravity model parameter {} must be strictly positive and finite, got {}.", name, value), file!(), line!()));
            }
        }
        Ok(())
    }
}

/// Where the zero angle lies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleReference {
    /// Zero is the lever held horizontal; the gravity term goes with `cos(angle)`.
    Horizontal,
    /// Zero is the stable hanging position; the lever is horizontal at `±π/2` and the gravity
    /// term goes with `sin(angle)`.
    HangingDown
}
impl AngleReference {
    pub fn gravity_trig<S: ArmScalar>(&self, angle: S) -> S {
        match self {
            AngleReference::Horizontal => { angle.cos() }
            AngleReference::HangingDown => { angle.sin() }
        }
    }
}
impl Default for AngleReference {
    fn default() -> Self { Self::Horizontal }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArmDynamicsConfig {
    #[serde(default = "ArmDynamicsConfig::default_gravity")]
    pub gravity: f64,
    pub gravity_model: GravityModel,
    #[serde(default)]
    pub angle_reference: AngleReference,
    #[serde(default)]
    pub friction_coefficient: f64,
    /// When present, controls are voltages routed through the motor; otherwise they are torques.
    #[serde(default)]
    pub motor: Option<MotorParameters>
}
impl ArmDynamicsConfig {
    pub fn new_point_mass(mass: f64, lever_arm: f64, friction_coefficient: f64) -> Self {
        Self {
            gravity: Self::default_gravity(),
            gravity_model: GravityModel::PointMass { mass, lever_arm },
            angle_reference: AngleReference::default(),
            friction_coefficient,
            motor: None
        }
    }
    pub fn new_distributed_mass(mass: f64, com_distance: f64, moment_of_inertia: f64, friction_coefficient: f64) -> Self {
        Self {
            gravity: Self::default_gravity(),
            gravity_model: GravityModel::DistributedMass { mass, com_distance, moment_of_inertia },
            angle_reference: AngleReference::default(),
            friction_coefficient,
            motor: None
        }
    }
    pub fn with_motor(mut self, motor: MotorParameters) -> Self {
        self.motor = Some(motor);
        self
    }
    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }
    pub fn with_angle_reference(mut self, angle_reference: AngleReference) -> Self {
        self.angle_reference = angle_reference;
        self
    }
    pub fn default_gravity() -> f64 { -9.81 }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Continuous-time equation of motion of the arm.  Immutable once built.
///
/// ## Example
/// ```
/// use armopt::arm_modules::arm_dynamics_module::{ArmDynamics, ArmDynamicsConfig, ArmState};
/// let dynamics = ArmDynamics::new(ArmDynamicsConfig::new_point_mass(2.0, 1.0, 0.0)).unwrap();
/// let d = dynamics.derivative(&ArmState::new(0.0, 0.5), 0.0);
/// assert_eq!(d.d_angle, 0.5);
/// assert!((d.d_angular_velocity + 9.81).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct ArmDynamics {
    config: ArmDynamicsConfig,
    motor: Option<MotorModel>,
    effective_inertia: f64,
    gravity_coefficient: f64
}
impl ArmDynamics {
    pub fn new(config: ArmDynamicsConfig) -> Result<Self, ArmoptError> {
        config.gravity_model.validate()?;
        if !config.gravity.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("gravity must be finite, got {}.", config.gravity), file!(), line!()));
        }
        if !(config.friction_coefficient >= 0.0) || !config.friction_coefficient.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("friction_coefficient must be non-negative and finite, got {}.", config.friction_coefficient), file!(), line!()));
        }
        let motor = match &config.motor {
            None => { None }
            Some(p) => { Some(MotorModel::new(p.clone())?) }
        };

        Ok(Self {
            effective_inertia: config.gravity_model.effective_inertia(),
            gravity_coefficient: config.gravity_model.gravity_coefficient(config.gravity),
            config,
            motor
        })
    }
    /// `control` is a torque or a voltage depending on [`Self::control_kind`].
    pub fn derivative<S: ArmScalar>(&self, state: &ArmState<S>, control: S) -> ArmStateDerivative<S> {
        let torque = self.control_torque(state, control);
        let gravity_term = self.config.angle_reference.gravity_trig(state.angle) * self.gravity_coefficient;
        let d_angular_velocity = gravity_term - state.angular_velocity * self.config.friction_coefficient + torque / self.effective_inertia;

        ArmStateDerivative {
            d_angle: state.angular_velocity,
            d_angular_velocity
        }
    }
    pub fn derivative_with_input(&self, state: &ArmState<f64>, control: &ControlInput) -> Result<ArmStateDerivative<f64>, ArmoptError> {
        self.check_control_input(control)?;
        return Ok(self.derivative(state, control.value()));
    }
    pub fn derivative_no_control(&self, state: &ArmState<f64>) -> ArmStateDerivative<f64> {
        return self.derivative(state, 0.0);
    }
    /// Torque delivered to the arm.  With a motor, zero volts still produces back-EMF braking.
    pub fn control_torque<S: ArmScalar>(&self, state: &ArmState<S>, control: S) -> S {
        return match &self.motor {
            None => { control }
            Some(motor) => { motor.torque_from_velocity_and_voltage(state.angular_velocity, control) }
        }
    }
    /// Motor current drawn at the given state and voltage, or `None` for a torque-controlled arm.
    pub fn control_current<S: ArmScalar>(&self, state: &ArmState<S>, control: S) -> Option<S> {
        return match &self.motor {
            None => { None }
            Some(motor) => { Some(motor.current_from_velocity_and_voltage(state.angular_velocity, control)) }
        }
    }
    pub fn check_control_input(&self, control: &ControlInput) -> Result<(), ArmoptError> {
        if control.kind() != self.control_kind() {
            return Err(ArmoptError::new_configuration_error_str(&format!("control input {:?} does not match the model's control kind {:?}.", control, self.control_kind()), file!(), line!()));
        }
        Ok(())
    }
    pub fn control_kind(&self) -> ControlKind {
        return match &self.motor {
            None => { ControlKind::Torque }
            Some(_) => { ControlKind::Voltage }
        }
    }
    /// Energy relative to the horizontal lever, ignoring the motor.  Conserved when friction and
    /// control are zero.
    pub fn mechanical_energy(&self, state: &ArmState<f64>) -> f64 {
        let potential_trig_integral = match self.config.angle_reference {
            AngleReference::Horizontal => { state.angle.sin() }
            AngleReference::HangingDown => { -state.angle.cos() }
        };
        return 0.5 * state.angular_velocity * state.angular_velocity - self.gravity_coefficient * potential_trig_integral;
    }
    pub fn config(&self) -> &ArmDynamicsConfig {
        &self.config
    }
    pub fn motor(&self) -> Option<&MotorModel> {
        self.motor.as_ref()
    }
    pub fn effective_inertia(&self) -> f64 {
        self.effective_inertia
    }
    pub fn gravity_coefficient(&self) -> f64 {
        self.gravity_coefficient
    }
    pub fn print_summary(&self) {
        armopt_print(">> Arm dynamics", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   gravity model", &format!("{:?}", self.config.gravity_model), PrintColor::Cyan);
        armopt_print_labeled_value("   angle reference", &format!("{:?}", self.config.angle_reference), PrintColor::Cyan);
        armopt_print_labeled_value("   gravity / friction", &format!("{} / {}", self.config.gravity, self.config.friction_coefficient), PrintColor::Cyan);
        armopt_print_labeled_value("   control kind", &format!("{:?}", self.control_kind()), PrintColor::Cyan);
        if let Some(motor) = &self.motor { motor.print_summary(); }
    }
}
