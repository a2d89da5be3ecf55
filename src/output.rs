//! CSV rendering and atomic persistence of aggregated time series.
//!
//! Output is a portability contract for the consuming spreadsheet/BI
//! tools: `\n` line endings and UTF-8 without a BOM on every platform,
//! string fields quoted, numeric fields bare.

use anyhow::{Context, Result, anyhow};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::metrics::{LOOKBACK_STEPS, derive};
use crate::store::TimeSeries;

/// Which column set a dataset is rendered with.
///
/// `Simple` is the original state-level layout including recovered counts;
/// `Granular` is the county-capable layout with second-order deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Simple,
    Granular,
}

static SIMPLE_COLUMNS: &[&str] = &[
    "Date",
    "ProvinceState",
    "CountryRegion",
    "Lat",
    "Long",
    "Confirmed",
    "Deaths",
    "Recovered",
    "NewConfirmed",
    "NewDeaths",
    "NewRecovered",
];

static GRANULAR_COLUMNS: &[&str] = &[
    "Date",
    "CountyDistrict",
    "ProvinceState",
    "CountryRegion",
    "Lat",
    "Long",
    "TotalConfirmed",
    "TotalDeaths",
    "NewConfirmed",
    "NewDeaths",
    "DeltaConfirmed",
    "DeltaDeaths",
];

/// Renders the whole time series as one CSV document.
///
/// Rows come out sorted by date ascending, then by key order (country,
/// state, county); the per-day BTreeMap iterates in exactly that order.
/// The first [`LOOKBACK_STEPS`] date indices are withheld so every emitted
/// row has the history its delta formulas need.
pub fn render(ts: &TimeSeries, schema: Schema) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let columns = match schema {
        Schema::Simple => SIMPLE_COLUMNS,
        Schema::Granular => GRANULAR_COLUMNS,
    };
    writer.write_record(columns)?;

    let last = ts.max_date_index().unwrap_or(0);
    for date_index in LOOKBACK_STEPS..=last {
        let Some(day) = ts.day(date_index) else {
            continue;
        };
        let date = ts.date_for(date_index).format("%Y-%m-%d").to_string();

        for (key, obs) in day {
            let d = derive(ts, date_index, key, obs);
            let row: Vec<String> = match schema {
                Schema::Simple => vec![
                    date.clone(),
                    key.state.clone(),
                    key.country.clone(),
                    obs.lat.clone(),
                    obs.long.clone(),
                    obs.confirmed.to_string(),
                    obs.deaths.to_string(),
                    obs.recovered.to_string(),
                    d.new_confirmed.to_string(),
                    d.new_deaths.to_string(),
                    d.new_recovered.to_string(),
                ],
                Schema::Granular => vec![
                    date.clone(),
                    key.county.clone(),
                    key.state.clone(),
                    key.country.clone(),
                    obs.lat.clone(),
                    obs.long.clone(),
                    obs.confirmed.to_string(),
                    obs.deaths.to_string(),
                    d.new_confirmed.to_string(),
                    d.new_deaths.to_string(),
                    d.delta_confirmed.to_string(),
                    d.delta_deaths.to_string(),
                ],
            };
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("flushing CSV writer: {e}"))?;
    String::from_utf8(bytes).context("rendered CSV was not UTF-8")
}

/// Writes `content` to `path` atomically: render to a sibling `.tmp` file,
/// then rename over the target. A run that dies mid-write leaves no
/// partial output file behind.
pub fn write_atomic(path: &str, content: &str) -> Result<()> {
    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, content).with_context(|| format!("writing {tmp}"))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming {tmp} into place"))?;

    debug!(path, bytes = content.len(), "Output file written");
    Ok(())
}

/// Renders a dataset and persists it in one step.
pub fn write_dataset(path: &str, ts: &TimeSeries, schema: Schema) -> Result<()> {
    let content = render(ts, schema)?;
    write_atomic(path, &content)?;
    info!(path, "Dataset written");
    Ok(())
}

/// Writes the "last updated" marker consumed by external tooling: the last
/// calendar date the ingested sources covered. This comes from the
/// ingestion pass itself, not from any one dataset's store, so files whose
/// rows were all filtered out still advance it.
pub fn write_last_updated(path: &str, last_date: Option<chrono::NaiveDate>) -> Result<()> {
    let Some(date) = last_date else {
        return Ok(());
    };
    write_atomic(path, &format!("{}\n", date.format("%Y-%m-%d")))
}
