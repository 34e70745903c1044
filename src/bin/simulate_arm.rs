extern crate armopt;

use std::env;
use std::path::Path;
use armopt::arm_modules::arm_simulation_module::ArmSimulationConfig;
use armopt::utils::utils_files::load_object_from_config_file;

fn main () {
    let args: Vec<String> = env::args().collect();
    assert_eq!(args.len(), 2, "Argument must be a simulation config file (json, ron, or toml)");

    let config: ArmSimulationConfig = load_object_from_config_file(Path::new(&args[1])).expect("error");
    let result = config.run().expect("error");

    result.print_summary();
}
