//! Per-output-dataset filter and rollup policy.
//!
//! Each configured dataset gets its own aggregation store; one ingested row
//! fans out to every dataset whose filters it passes, after the dataset's
//! granularity masking.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::geo::GeoFields;

/// Coarsest level at which output rows are distinguished. Fields finer than
/// the floor are cleared before key construction, so rows differing only in
/// those fields collapse and their counts sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    County,
    State,
    Country,
}

/// One output dataset: optional exact-match filters plus a granularity
/// floor, deserialized from the datasets JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetPolicy {
    /// Output file stem, e.g. `"us_counties"` becomes `us_counties.csv`.
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    pub granularity: Granularity,
}

impl DatasetPolicy {
    /// True when every configured filter matches the row's corresponding
    /// field, case-insensitively. Unset filters always match.
    pub fn accepts(&self, fields: &GeoFields) -> bool {
        let matches = |filter: &Option<String>, value: &str| {
            filter
                .as_ref()
                .is_none_or(|f| f.eq_ignore_ascii_case(value))
        };
        matches(&self.country, &fields.country)
            && matches(&self.state, &fields.state)
            && matches(&self.county, &fields.county)
    }

    /// Clears fields below the granularity floor so finer-grained rows
    /// collapse onto one key in the store.
    pub fn mask(&self, fields: &mut GeoFields) {
        match self.granularity {
            Granularity::County => {}
            Granularity::State => fields.county.clear(),
            Granularity::Country => {
                fields.county.clear();
                fields.state.clear();
            }
        }
    }
}

/// Datasets built when no config file is given: one worldwide country-level
/// rollup and one US county-level breakdown.
pub fn default_datasets() -> Vec<DatasetPolicy> {
    vec![
        DatasetPolicy {
            name: "countries".to_string(),
            country: None,
            state: None,
            county: None,
            granularity: Granularity::Country,
        },
        DatasetPolicy {
            name: "us_counties".to_string(),
            country: Some("US".to_string()),
            state: None,
            county: None,
            granularity: Granularity::County,
        },
    ]
}

/// Loads dataset policies from a JSON array on disk:
///
/// ```json
/// [
///   { "name": "countries", "granularity": "country" },
///   { "name": "us_counties", "country": "US", "granularity": "county" }
/// ]
/// ```
pub fn load_datasets(path: &str) -> Result<Vec<DatasetPolicy>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading dataset config {path}"))?;
    let datasets: Vec<DatasetPolicy> =
        serde_json::from_str(&content).with_context(|| format!("parsing dataset config {path}"))?;
    debug!(count = datasets.len(), path, "Dataset config loaded");
    Ok(datasets)
}
