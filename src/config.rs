use crate::error::{ReportError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;
pub const DEFAULT_END_OF_REPORT_MARKER: &str = "*** END OF THE REPORT ***";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    #[schemars(description = "How many leading rows of a sheet are searched for the header row.")]
    pub header_scan_rows: usize,

    #[schemars(
        description = "Marker text that ends data rows in repo exports. Compared case-insensitively."
    )]
    pub end_of_report_marker: String,

    #[schemars(
        description = "Allow pattern matching on instrument names when no exact label matches."
    )]
    pub pattern_fallback: bool,

    #[schemars(
        description = "Value date used for valuation and SLR sheets that carry no date column. Defaults to the processing day."
    )]
    pub default_value_date: Option<NaiveDate>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            end_of_report_marker: DEFAULT_END_OF_REPORT_MARKER.to_string(),
            pattern_fallback: true,
            default_value_date: None,
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_scan_rows == 0 {
            return Err(ReportError::InvalidConfig(
                "header_scan_rows must be at least 1".to_string(),
            ));
        }
        if self.end_of_report_marker.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "end_of_report_marker cannot be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
