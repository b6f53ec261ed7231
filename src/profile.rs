use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// The only controller kind this tool can record codes for.
pub const SUPPORTED_CONTROLLER: &str = "Broadlink";
/// The only command encoding this tool emits.
pub const SUPPORTED_ENCODING: &str = "Base64";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing or invalid mandatory field in json file: {0}")]
    MissingField(&'static str),
    #[error("controller {0} not supported")]
    UnsupportedController(String),
    #[error("encoding {0} not supported")]
    UnsupportedEncoding(String),
    #[error("minTemperature {min} is above maxTemperature {max}")]
    TemperatureRange { min: i32, max: i32 },
    #[error("operationModes must not be empty")]
    NoOperationModes,
    #[error("precision must be a positive integer, got {0}")]
    InvalidPrecision(i32),
}

/// Axes of the command matrix declared by a SmartIR climate file.
///
/// Extracted once from the template and immutable for the whole learning
/// session. `fan_modes`/`swing_modes` are `None` when the device has no such
/// axis; an empty array in the template counts as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub min_temperature: i32,
    pub max_temperature: i32,
    pub precision: i32,
    pub operation_modes: Vec<String>,
    pub fan_modes: Option<Vec<String>>,
    pub swing_modes: Option<Vec<String>>,
}

impl DeviceProfile {
    pub fn from_value(raw: &Value) -> Result<Self, ProfileError> {
        let controller = str_field(raw, "supportedController")?;
        if controller != SUPPORTED_CONTROLLER {
            return Err(ProfileError::UnsupportedController(controller.to_string()));
        }

        let encoding = str_field(raw, "commandsEncoding")?;
        if encoding != SUPPORTED_ENCODING {
            return Err(ProfileError::UnsupportedEncoding(encoding.to_string()));
        }

        let min_temperature = int_field(raw, "minTemperature")?;
        let max_temperature = int_field(raw, "maxTemperature")?;
        if min_temperature > max_temperature {
            return Err(ProfileError::TemperatureRange {
                min: min_temperature,
                max: max_temperature,
            });
        }

        let precision = match raw.get("precision") {
            None => 1,
            Some(_) => int_field(raw, "precision")?,
        };
        if precision < 1 {
            return Err(ProfileError::InvalidPrecision(precision));
        }

        let operation_modes = string_list(raw, "operationModes")?
            .ok_or(ProfileError::MissingField("operationModes"))?;
        if operation_modes.is_empty() {
            return Err(ProfileError::NoOperationModes);
        }

        Ok(Self {
            min_temperature,
            max_temperature,
            precision,
            operation_modes,
            fan_modes: string_list(raw, "fanModes")?.filter(|m| !m.is_empty()),
            swing_modes: string_list(raw, "swingModes")?.filter(|m| !m.is_empty()),
        })
    }

    /// All temperature steps, `min..=max` by `precision`.
    pub fn temperatures(&self) -> impl Iterator<Item = i32> + '_ {
        (self.min_temperature..=self.max_temperature).step_by(self.precision as usize)
    }
}

fn str_field<'a>(raw: &'a Value, key: &'static str) -> Result<&'a str, ProfileError> {
    raw.get(key)
        .and_then(Value::as_str)
        .ok_or(ProfileError::MissingField(key))
}

fn int_field(raw: &Value, key: &'static str) -> Result<i32, ProfileError> {
    // SmartIR files in the wild carry both `18` and `18.0` here
    raw.get(key)
        .and_then(Value::as_f64)
        .map(|v| v as i32)
        .ok_or(ProfileError::MissingField(key))
}

fn string_list(raw: &Value, key: &'static str) -> Result<Option<Vec<String>>, ProfileError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .map(Some)
            .ok_or(ProfileError::MissingField(key)),
    }
}

/// A SmartIR template as loaded from disk: the raw document (key order
/// preserved) plus the typed profile extracted from it. The raw document is
/// kept so the final output retains manufacturer/model metadata untouched.
#[derive(Debug, Clone)]
pub struct SmartIrDoc {
    path: PathBuf,
    raw: Value,
    pub profile: DeviceProfile,
}

impl SmartIrDoc {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: Value =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ProfileError::Json {
                path: path.clone(),
                source,
            })?;
        Self::from_value(path, raw)
    }

    pub fn from_value(path: PathBuf, raw: Value) -> Result<Self, ProfileError> {
        let profile = DeviceProfile::from_value(&raw)?;
        if raw.get("commands").is_none() {
            return Err(ProfileError::MissingField("commands"));
        }
        Ok(Self { path, raw, profile })
    }

    pub fn commands_template(&self) -> &Value {
        // presence checked at construction
        &self.raw["commands"]
    }

    /// Directory the template lives in; checkpoints and output land here too.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("smartir")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full document with the `commands` subtree replaced.
    pub fn with_commands(&self, commands: Value) -> Value {
        let mut merged = self.raw.clone();
        merged["commands"] = commands;
        merged
    }
}
