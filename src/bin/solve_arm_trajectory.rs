extern crate armopt;

use std::env;
use std::path::Path;
use armopt::trajectory_optimization::trajectory_problem::ArmTrajectoryProblem;
use armopt::utils::utils_console::{armopt_print, armopt_print_warning, PrintColor, PrintMode};
use armopt::utils::utils_traits::SaveAndLoadable;

fn main () {
    let args: Vec<String> = env::args().collect();
    assert!(args.len() == 2 || args.len() == 3, "Arguments must be a problem config file (json, ron, or toml) and, optionally, an output json path");

    let start = instant::Instant::now();
    let problem = ArmTrajectoryProblem::new_from_config_file(Path::new(&args[1])).expect("error");
    problem.print_summary();

    match problem.solve() {
        Ok(solved) => {
            solved.print_summary();
            armopt_print(&format!("total wall time {:?}", start.elapsed()), PrintMode::Println, PrintColor::None, false);
            // writes the trajectory as json if an output path was given
            if args.len() == 3 {
                solved.trajectory().save_to_path(Path::new(&args[2])).expect("error");
                armopt_print(&format!("saved trajectory to {}", args[2]), PrintMode::Println, PrintColor::Green, false);
            }
        }
        Err(e) => {
            if args.len() == 3 { armopt_print_warning(&format!("solve failed, nothing was written to {}", args[2])); }
            armopt_print(&format!("{}", e), PrintMode::Println, PrintColor::Red, true);
            std::process::exit(1);
        }
    }
}
