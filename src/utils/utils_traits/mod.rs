use std::path::Path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::utils::utils_errors::ArmoptError;
use crate::utils::utils_files::{load_object_from_json_string, read_file_contents_to_string, save_string_to_file};

/// Anything that can be written to and read back from a json file.
pub trait SaveAndLoadable {
    type SaveType: Serialize + DeserializeOwned;

    fn get_save_serialization_object(&self) -> Self::SaveType;
    fn get_serialization_string(&self) -> String {
        serde_json::to_string(&self.get_save_serialization_object()).expect("error")
    }
    fn save_to_path(&self, path: &Path) -> Result<(), ArmoptError> {
        save_string_to_file(path, &self.get_serialization_string())
    }
    fn load_from_path(path: &Path) -> Result<Self, ArmoptError> where Self: Sized {
        let s = read_file_contents_to_string(path)?;
        return Self::load_from_json_string(&s);
    }
    fn load_from_json_string(json_str: &str) -> Result<Self, ArmoptError> where Self: Sized {
        let load: Self::SaveType = load_object_from_json_string(json_str)?;
        return Self::load_from_save_serialization_object(load);
    }
    fn load_from_save_serialization_object(load: Self::SaveType) -> Result<Self, ArmoptError> where Self: Sized;
}

pub trait ToAndFromRonString: Serialize + DeserializeOwned {
    fn convert_to_ron_string(&self) -> String {
        ron::to_string(self).expect("error")
    }
    fn load_from_ron_string(ron_string: &str) -> Result<Self, ArmoptError> where Self: Sized {
        let load: Result<Self, _> = ron::from_str(ron_string);
        return match load {
            Ok(load) => { Ok(load) }
            Err(e) => {
                Err(ArmoptError::new_generic_error_str(&format!("Could not load ron string {:?} into correct type.  Error is {}.", ron_string, e), file!(), line!()))
            }
        }
    }
}
impl <T> ToAndFromRonString for T where T: Serialize + DeserializeOwned {  }
