use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Options for GPX to CSV conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// File extension picked up when scanning a folder (default: "gpx")
    #[serde(default = "default_track_extension")]
    pub track_extension: String,

    /// chrono format string for the `date` column (default: "%Y-%m-%d %H:%M:%S")
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            track_extension: default_track_extension(),
            date_format: default_date_format(),
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file. Missing keys fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when `file_name` carries the configured track extension.
    pub fn matches_extension(&self, file_name: &str) -> bool {
        file_name.ends_with(&format!(".{}", self.track_extension))
    }
}

fn default_track_extension() -> String {
    "gpx".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}
