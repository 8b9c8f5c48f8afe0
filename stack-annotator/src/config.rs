use std::{
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(serde::Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Image, animated GIF or folder to open. The synthetic demo stack is
    /// shown if neither this nor the first argument is set.
    pub input: Option<PathBuf>,
    /// Settings file applied at startup and written by "Save settings"
    pub settings_path: PathBuf,
    /// Maximum number of undo steps per frame, unlimited if missing
    pub history_depth: Option<NonZeroUsize>,
    /// Never grow regions into the last row and column
    pub exclude_trailing_edge: bool,
    pub viewport: [f32; 2],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            settings_path: "annotator.settings".into(),
            history_depth: None,
            exclude_trailing_edge: false,
            viewport: [800.0, 800.0],
        }
    }
}

impl Config {
    /// Reads `path`, falling back to the defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::File::open(path) {
            Ok(f) => Ok(serde_json::from_reader(io::BufReader::new(f))?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"history_depth": 20}"#).unwrap();
        assert_eq!(config.history_depth, NonZeroUsize::new(20));
        assert_eq!(config.settings_path, PathBuf::from("annotator.settings"));
        assert_eq!(config.viewport, [800.0, 800.0]);
        assert!(config.input.is_none());
    }

    #[test]
    fn zero_history_depth_is_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"history_depth": 0}"#).is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("stack-annotator-missing-config.json");
        let config = Config::load(&path).unwrap();
        assert!(!config.exclude_trailing_edge);
    }

    #[test]
    fn malformed_file_is_reported() {
        let path = std::env::temp_dir().join("stack-annotator-malformed-config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = Config::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
