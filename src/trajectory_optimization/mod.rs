pub mod arm_trajectory;
pub mod single_shooting;
pub mod trajectory_problem;
