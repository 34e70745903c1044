use std::f64::consts::PI;
use serde::{Serialize, Deserialize};
use crate::utils::utils_autodiff::ArmScalar;
use crate::utils::utils_console::{armopt_print, armopt_print_labeled_value, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;

/// Nameplate characteristics of a (possibly geared, possibly ganged) DC motor.
///
/// `stall_torque`, `stall_current`, `free_current` and `free_speed` are per-motor, at the motor
/// shaft.  `gearing` and `num_motors` are applied when a [`MotorModel`] is built from these
/// parameters.  Speeds are in rad/s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotorParameters {
    nominal_voltage: f64,
    stall_torque: f64,
    stall_current: f64,
    free_current: f64,
    free_speed: f64,
    #[serde(default = "MotorParameters::default_gearing")]
    gearing: f64,
    #[serde(default = "MotorParameters::default_num_motors")]
    num_motors: usize
}
impl MotorParameters {
    pub fn new(nominal_voltage: f64, stall_torque: f64, stall_current: f64, free_current: f64, free_speed: f64) -> Result<Self, ArmoptError> {
        let out_self = Self {
            nominal_voltage,
            stall_torque,
            stall_current,
            free_current,
            free_speed,
            gearing: Self::default_gearing(),
            num_motors: Self::default_num_motors()
        };
        out_self.validate()?;
        Ok(out_self)
    }
    /// Kraken X60 with field oriented control.  Free speed is 5800 rpm.
    pub fn kraken_x60_foc() -> Self {
        Self {
            nominal_voltage: 12.0,
            stall_torque: 9.37,
            stall_current: 483.0,
            free_current: 2.0,
            free_speed: 5800.0 * 2.0 * PI / 60.0,
            gearing: 1.0,
            num_motors: 1
        }
    }
    /// Returns a new parameter set whose gearing is multiplied by `gearing_reduction`.
    pub fn with_reduction(&self, gearing_reduction: f64) -> Result<Self, ArmoptError> {
        if !(gearing_reduction > 0.0) || !gearing_reduction.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("gearing reduction must be strictly positive and finite, got {}.", gearing_reduction), file!(), line!()));
        }
        let mut out_self = self.clone();
        out_self.gearing *= gearing_reduction;
        out_self.validate()?;
        Ok(out_self)
    }
    pub fn with_num_motors(&self, num_motors: usize) -> Result<Self, ArmoptError> {
        let mut out_self = self.clone();
        out_self.num_motors = num_motors;
        out_self.validate()?;
        Ok(out_self)
    }
    pub fn validate(&self) -> Result<(), ArmoptError> {
        let positive = [("nominal_voltage", self.nominal_voltage), ("stall_torque", self.stall_torque), ("stall_current", self.stall_current), ("free_speed", self.free_speed), ("gearing", self.gearing)];
        for (name, value) in positive.iter() {
            if !(*value > 0.0) || !value.is_finite() {
                return Err(ArmoptError::new_configuration_error_str(&format!("motor parameter {} must be strictly positive and finite, got {}.", name, value), file!(), line!()));
            }
        }
        if !(self.free_current >= 0.0) || !self.free_current.is_finite() {
            return Err(ArmoptError::new_configuration_error_str(&format!("motor parameter free_current must be non-negative and finite, got {}.", self.free_current), file!(), line!()));
        }
        if self.num_motors == 0 {
            return Err(ArmoptError::new_configuration_error_str("num_motors must be at least 1.", file!(), line!()));
        }
        // resistance * free_current < nominal_voltage reduces to free_current < stall_current.
        if !(self.free_current < self.stall_current) {
            return Err(ArmoptError::new_configuration_error_str(&format!("free_current ({}) must be smaller than stall_current ({}), otherwise Kv is undefined.", self.free_current, self.stall_current), file!(), line!()));
        }
        Ok(())
    }
    pub fn nominal_voltage(&self) -> f64 {
        self.nominal_voltage
    }
    pub fn gearing(&self) -> f64 {
        self.gearing
    }
    pub fn num_motors(&self) -> usize {
        self.num_motors
    }
    fn default_gearing() -> f64 { 1.0 }
    fn default_num_motors() -> usize { 1 }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Linear DC motor equivalent circuit, expressed at the output shaft.
///
/// ## Example
/// ```
/// use armopt::arm_modules::arm_motor_module::{MotorModel, MotorParameters};
/// let motor = MotorModel::new(MotorParameters::kraken_x60_foc()).unwrap().with_reduction(50.0).unwrap();
/// let voltage = motor.voltage_from_torque_and_velocity(20.0, 1.5);
/// let torque: f64 = motor.torque_from_velocity_and_voltage(1.5, voltage);
/// assert!((torque - 20.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct MotorModel {
    parameters: MotorParameters,
    stall_torque: f64,
    stall_current: f64,
    free_current: f64,
    free_speed: f64,
    resistance: f64,
    kv: f64,
    kt: f64
}
impl MotorModel {
    pub fn new(parameters: MotorParameters) -> Result<Self, ArmoptError> {
        parameters.validate()?;

        let n = parameters.num_motors as f64;
        let stall_torque = parameters.stall_torque * n * parameters.gearing;
        let stall_current = parameters.stall_current * n;
        let free_current = parameters.free_current * n;
        let free_speed = parameters.free_speed / parameters.gearing;

        let resistance = parameters.nominal_voltage / stall_current;
        let kv_denominator = parameters.nominal_voltage - resistance * free_current;
        if !(kv_denominator > 0.0) {
            return Err(ArmoptError::new_configuration_error_str(&format!("degenerate motor parameters: Kv denominator is {}.", kv_denominator), file!(), line!()));
        }
        let kv = free_speed / kv_denominator;
        let kt = stall_torque / stall_current;

        Ok(Self {
            parameters,
            stall_torque,
            stall_current,
            free_current,
            free_speed,
            resistance,
            kv,
            kt
        })
    }
    /// Returns a new model with `gearing` applied on top of the current gearing.  Kt and Kv are
    /// recomputed from the new stall torque and free speed.
    pub fn with_reduction(&self, gearing: f64) -> Result<Self, ArmoptError> {
        return Self::new(self.parameters.with_reduction(gearing)?);
    }
    pub fn current_from_velocity_and_voltage<S: ArmScalar>(&self, velocity: S, voltage: S) -> S {
        return voltage / self.resistance - velocity / (self.kv * self.resistance);
    }
    pub fn current_from_torque<S: ArmScalar>(&self, torque: S) -> S {
        return torque / self.kt;
    }
    pub fn torque_from_current<S: ArmScalar>(&self, current: S) -> S {
        return current * self.kt;
    }
    pub fn torque_from_velocity_and_voltage<S: ArmScalar>(&self, velocity: S, voltage: S) -> S {
        return self.torque_from_current(self.current_from_velocity_and_voltage(velocity, voltage));
    }
    pub fn voltage_from_torque_and_velocity<S: ArmScalar>(&self, torque: S, velocity: S) -> S {
        return velocity / self.kv + torque * (self.resistance / self.kt);
    }
    pub fn velocity_from_voltage_and_torque<S: ArmScalar>(&self, voltage: S, torque: S) -> S {
        return voltage * self.kv - torque * (self.resistance * self.kv / self.kt);
    }
    pub fn parameters(&self) -> &MotorParameters {
        &self.parameters
    }
    pub fn nominal_voltage(&self) -> f64 {
        self.parameters.nominal_voltage
    }
    pub fn stall_torque(&self) -> f64 {
        self.stall_torque
    }
    pub fn stall_current(&self) -> f64 {
        self.stall_current
    }
    pub fn free_current(&self) -> f64 {
        self.free_current
    }
    pub fn free_speed(&self) -> f64 {
        self.free_speed
    }
    pub fn resistance(&self) -> f64 {
        self.resistance
    }
    pub fn kv(&self) -> f64 {
        self.kv
    }
    pub fn kt(&self) -> f64 {
        self.kt
    }
    pub fn print_summary(&self) {
        armopt_print(">> Motor model (output shaft)", PrintMode::Println, PrintColor::Blue, true);
        armopt_print_labeled_value("   gearing", &format!("{} x {} motor(s)", self.parameters.gearing, self.parameters.num_motors), PrintColor::Cyan);
        armopt_print_labeled_value("   stall torque", &format!("{:.4} N*m", self.stall_torque), PrintColor::Cyan);
        armopt_print_labeled_value("   free speed", &format!("{:.4} rad/s", self.free_speed), PrintColor::Cyan);
        armopt_print_labeled_value("   resistance", &format!("{:.6} ohm", self.resistance), PrintColor::Cyan);
        armopt_print_labeled_value("   Kv / Kt", &format!("{:.6} / {:.6}", self.kv, self.kt), PrintColor::Cyan);
    }
}
