use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use serde::de::DeserializeOwned;
use crate::utils::utils_console::{armopt_print, PrintColor, PrintMode};
use crate::utils::utils_errors::ArmoptError;

pub fn read_file_contents_to_string(path: &Path) -> Result<String, ArmoptError> {
    return match fs::read_to_string(path) {
        Ok(s) => { Ok(s) }
        Err(e) => {
            Err(ArmoptError::new_generic_error_str(&format!("Could not read file {:?}.  Error is {:?}.", path, e.to_string()), file!(), line!()))
        }
    }
}

pub fn save_string_to_file(path: &Path, s: &str) -> Result<(), ArmoptError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                return Err(ArmoptError::new_generic_error_str(&format!("Could not create directory {:?}.  Error is {:?}.", parent, e.to_string()), file!(), line!()));
            }
        }
    }

    let mut write_res = File::create(path);
    match &mut write_res {
        Ok(write) => {
            if let Err(e) = write.write_all(s.as_bytes()) {
                return Err(ArmoptError::new_generic_error_str(&format!("Could not write to file {:?}.  Error is {:?}.", path, e.to_string()), file!(), line!()));
            }
        }
        Err(e) => {
            return Err(ArmoptError::new_generic_error_str(&format!("Could not save object to file.  Error is {:?}.", e.to_string()), file!(), line!()));
        }
    }

    Ok(())
}

pub fn load_object_from_json_string<T: DeserializeOwned>(json_str: &str) -> Result<T, ArmoptError> {
    let o_res = serde_json::from_str(json_str);
    return match o_res {
        Ok(o) => {
            Ok(o)
        }
        Err(e) => {
            armopt_print(json_str, PrintMode::Println, PrintColor::Red, false);
            Err(ArmoptError::new_generic_error_str(&format!("load_object_from_json_string() failed.  The given json_string is incompatible with the requested type.  Error is {}.", e), file!(), line!()))
        }
    }
}

pub fn load_object_from_toml_string<T: DeserializeOwned>(toml_str: &str) -> Result<T, ArmoptError> {
    let o_res = toml::from_str(toml_str);
    return match o_res {
        Ok(o) => { Ok(o) }
        Err(e) => {
            Err(ArmoptError::new_generic_error_str(&format!("load_object_from_toml_string() failed.  Error is {}.", e), file!(), line!()))
        }
    }
}

pub fn load_object_from_ron_string<T: DeserializeOwned>(ron_str: &str) -> Result<T, ArmoptError> {
    let o_res = ron::from_str(ron_str);
    return match o_res {
        Ok(o) => { Ok(o) }
        Err(e) => {
            Err(ArmoptError::new_generic_error_str(&format!("load_object_from_ron_string() failed.  Error is {}.", e), file!(), line!()))
        }
    }
}

/// Loads a config object from a file, choosing the format from the file extension
/// (`.json`, `.ron`, or `.toml`).
pub fn load_object_from_config_file<T: DeserializeOwned>(path: &Path) -> Result<T, ArmoptError> {
    let contents = read_file_contents_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
    return match extension.as_str() {
        "json" => { load_object_from_json_string(&contents) }
        "ron" => { load_object_from_ron_string(&contents) }
        "toml" => { load_object_from_toml_string(&contents) }
        _ => {
            Err(ArmoptError::new_generic_error_str(&format!("Unsupported config file extension {:?} for file {:?}.  Expected json, ron, or toml.", extension, path), file!(), line!()))
        }
    }
}
