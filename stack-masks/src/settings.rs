//! User settings, stored as a flat json record.
//!
//! Settings files are applied field by field: a missing or malformed field
//! keeps its current value and yields a [`SettingsWarning`], the remaining
//! fields still apply.

use log::warn;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::ThresholdPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// RGBA of the brush preview
    #[serde(alias = "colorCursor")]
    pub cursor_color: [u8; 4],
    /// RGBA of labeled pixels
    #[serde(alias = "colorMask")]
    pub mask_color: [u8; 4],
    /// Region growing tolerance in gray levels
    pub tolerance: u32,
    #[serde(alias = "onlyDarkerPx")]
    pub only_darker_pixels: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cursor_color: [255, 0, 100, 255],
            mask_color: [20, 240, 92, 255],
            tolerance: 5,
            only_darker_pixels: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsWarning {
    #[error("Settings field '{0}' is missing")]
    FieldMissing(&'static str),
    #[error("Settings field '{field}' is invalid: {reason}")]
    FieldInvalid { field: &'static str, reason: String },
}

impl Settings {
    pub fn policy(&self) -> ThresholdPolicy {
        ThresholdPolicy::from_only_darker(self.only_darker_pixels)
    }

    /// Applies every valid field of `record`
    pub fn apply_record(&mut self, record: &Map<String, Value>) -> Vec<SettingsWarning> {
        let warnings = [
            apply_field(record, "cursorColor", "colorCursor", &mut self.cursor_color),
            apply_field(record, "maskColor", "colorMask", &mut self.mask_color),
            apply_field(record, "tolerance", "tolerance", &mut self.tolerance),
            apply_field(
                record,
                "onlyDarkerPixels",
                "onlyDarkerPx",
                &mut self.only_darker_pixels,
            ),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        for warning in &warnings {
            warn!("{warning}");
        }
        warnings
    }

    /// Applies a json document. Fails only if `text` is no json object.
    pub fn apply_json(&mut self, text: &str) -> Result<Vec<SettingsWarning>, serde_json::Error> {
        let record: Map<String, Value> = serde_json::from_str(text)?;
        Ok(self.apply_record(&record))
    }

    /// Default settings updated by `text`
    pub fn from_json(text: &str) -> Result<(Self, Vec<SettingsWarning>), serde_json::Error> {
        let mut settings = Self::default();
        let warnings = settings.apply_json(text)?;
        Ok((settings, warnings))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn apply_field<T: DeserializeOwned>(
    record: &Map<String, Value>,
    key: &'static str,
    alias: &'static str,
    target: &mut T,
) -> Option<SettingsWarning> {
    let Some(value) = record.get(key).or_else(|| record.get(alias)) else {
        return Some(SettingsWarning::FieldMissing(key));
    };
    match T::deserialize(value) {
        Ok(v) => {
            *target = v;
            None
        }
        Err(e) => Some(SettingsWarning::FieldInvalid {
            field: key,
            reason: e.to_string(),
        }),
    }
}
