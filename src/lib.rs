//! armopt computes control trajectories for a single-link rotating arm driven by an electric
//! motor.  The arm dynamics (optionally routed through a DC motor model that turns voltage into
//! torque) are discretized with explicit Euler and transcribed into a finite-horizon nonlinear
//! program, which is then handed to an external solver.
//!
//! The crate is organized leaves first: [`arm_modules`] holds the motor model, the continuous
//! dynamics, the discrete propagator and a forward simulator; [`trajectory_optimization`] builds
//! and solves the transcription; [`nonlinear_optimization`] wraps the solver back-ends.

pub mod arm_modules;
pub mod nonlinear_optimization;
pub mod trajectory_optimization;
pub mod utils;
