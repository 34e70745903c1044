pub mod arm_motor_module;
pub mod arm_dynamics_module;
pub mod arm_propagator_module;
pub mod arm_simulation_module;
