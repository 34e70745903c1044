use std::fmt;
use std::time::Duration;

/// A common error type returned by functions throughout the crate.
#[derive(Clone, Debug)]
pub enum ArmoptError {
    GenericError(String),
    ConfigurationError(String),
    SolveFailure(SolveFailureReport)
}
impl ArmoptError {
    pub fn new_generic_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} -- File: {}, Line: {}", s.to_string(), file, line);
        return Self::GenericError(s);
    }
    pub fn new_configuration_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("CONFIGURATION ERROR: {} -- File: {}, Line: {}", s.to_string(), file, line);
        return Self::ConfigurationError(s);
    }
    pub fn new_solve_failure(report: SolveFailureReport) -> Self {
        return Self::SolveFailure(report);
    }
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::ConfigurationError(_))
    }
    pub fn is_solve_failure(&self) -> bool {
        matches!(self, Self::SolveFailure(_))
    }
    pub fn solve_failure_report(&self) -> Option<&SolveFailureReport> {
        return match self {
            Self::SolveFailure(r) => { Some(r) }
            _ => { None }
        }
    }
}
impl fmt::Display for ArmoptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmoptError::GenericError(s) => { write!(f, "{}", s) }
            ArmoptError::ConfigurationError(s) => { write!(f, "{}", s) }
            ArmoptError::SolveFailure(r) => { write!(f, "SOLVE FAILURE: {}", r) }
        }
    }
}
impl std::error::Error for ArmoptError { }

/// Diagnostic carried by a failed solve.  Nothing in here should be read as a usable trajectory.
#[derive(Clone, Debug)]
pub struct SolveFailureReport {
    pub exit_status: String,
    pub message: String,
    pub num_outer_iterations: usize,
    pub num_inner_iterations: usize,
    pub solve_time: Option<Duration>,
    pub cost: Option<f64>,
    pub max_constraint_violation: Option<f64>
}
impl SolveFailureReport {
    pub fn new(exit_status: &str, message: &str) -> Self {
        Self {
            exit_status: exit_status.to_string(),
            message: message.to_string(),
            num_outer_iterations: 0,
            num_inner_iterations: 0,
            solve_time: None,
            cost: None,
            max_constraint_violation: None
        }
    }
}
impl fmt::Display for SolveFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}).  outer iterations: {}, inner iterations: {}", self.message, self.exit_status, self.num_outer_iterations, self.num_inner_iterations)?;
        if let Some(t) = self.solve_time { write!(f, ", after {:?}", t)?; }
        if let Some(c) = self.cost { write!(f, ", cost: {:.6}", c)?; }
        if let Some(v) = self.max_constraint_violation { write!(f, ", max constraint violation: {:.3e}", v)?; }
        Ok(())
    }
}
