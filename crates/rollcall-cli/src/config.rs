use rollcall_core::DetectorParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rollcall.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Station configuration, loaded from a TOML file with defaults for every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device index, used when `camera_device` is unset.
    pub camera_index: u32,
    /// Explicit V4L2 device path (e.g. /dev/video2).
    pub camera_device: Option<String>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames discarded after opening the camera so exposure can settle.
    pub warmup_frames: usize,
    /// Pretrained cascade model (SeetaFace format).
    pub model_path: PathBuf,
    /// One `<name>.png` reference image per student.
    pub reference_dir: PathBuf,
    pub attendance_dir: PathBuf,
    /// Log file name inside `attendance_dir`.
    pub attendance_file: String,
    /// Edge length reference faces are normalized to.
    pub face_size: u32,
    /// L2 pixel distance below which a face matches a reference.
    pub match_threshold: f64,
    /// Draw the camera picture in the terminal while a loop runs. Ignored
    /// when stdout is not a terminal.
    pub preview: bool,
    pub detector: DetectorParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_index: 0,
            camera_device: None,
            frame_width: 640,
            frame_height: 480,
            warmup_frames: 4,
            model_path: PathBuf::from("models/seeta_fd_frontal_v1.0.bin"),
            reference_dir: PathBuf::from("reference_faces"),
            attendance_dir: PathBuf::from("attendance"),
            attendance_file: "attendance.txt".to_string(),
            face_size: 100,
            match_threshold: 5000.0,
            preview: true,
            detector: DetectorParams::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or
    /// fall back to defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                tracing::debug!("no config file, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&src).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.face_size == 0 {
            return Err(ConfigError::Invalid("face_size must be positive".into()));
        }
        if !(self.match_threshold.is_finite() && self.match_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "match_threshold must be a positive number, got {}",
                self.match_threshold
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::Invalid("frame size must be positive".into()));
        }
        let file = Path::new(&self.attendance_file);
        if self.attendance_file.is_empty() || file.components().count() != 1 || file.file_name().is_none() {
            return Err(ConfigError::Invalid(format!(
                "attendance_file must be a plain file name, got {:?}",
                self.attendance_file
            )));
        }
        self.detector
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Device path to open.
    pub fn camera_device(&self) -> String {
        self.camera_device
            .clone()
            .unwrap_or_else(|| format!("/dev/video{}", self.camera_index))
    }

    pub fn attendance_log_path(&self) -> PathBuf {
        self.attendance_dir.join(&self.attendance_file)
    }
}
