//! CSV header resolution and row parsing for the two source layouts.
//!
//! The cumulative time-series files carry a fixed four-column prefix
//! followed by one column per date. The daily report files changed column
//! naming at least three times over their history, so their headers are
//! resolved by case-insensitive lookup against a synonym table instead of
//! by position.

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use csv::StringRecord;
use tracing::trace;

use crate::geo::GeoFields;

/// Semantic fields a daily-report column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    County,
    State,
    Country,
    Latitude,
    Longitude,
    Confirmed,
    Deaths,
}

/// Known historical column spellings, matched case-insensitively.
static COLUMN_SYNONYMS: &[(&str, Field)] = &[
    ("admin2", Field::County),
    ("county", Field::County),
    ("province_state", Field::State),
    ("province/state", Field::State),
    ("country_region", Field::Country),
    ("country/region", Field::Country),
    ("lat", Field::Latitude),
    ("latitude", Field::Latitude),
    ("long", Field::Longitude),
    ("long_", Field::Longitude),
    ("longitude", Field::Longitude),
    ("confirmed", Field::Confirmed),
    ("deaths", Field::Deaths),
];

/// Builds a CSV reader over raw bytes, stripping a UTF-8 BOM if present.
/// Header rows are read explicitly by the caller, so automatic header
/// handling is off.
pub fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes)
}

fn clean(cell: &str) -> &str {
    cell.trim_start_matches('\u{feff}').trim()
}

fn parse_count(cell: &str) -> Option<i64> {
    cell.trim().parse::<i64>().ok()
}

/// Fixed prefix the time-series header must carry in positions 0–3.
static SERIES_PREFIX: &[&str] = &["Province/State", "Country/Region", "Lat", "Long"];

/// Resolved header for the cumulative time-series layout: the dates named
/// by columns 4 and onward.
#[derive(Debug)]
pub struct SeriesHeader {
    pub dates: Vec<NaiveDate>,
}

/// Validates the fixed time-series header and parses its `M/D/YY` date
/// columns. Any positional mismatch or unparseable date is a format error;
/// the schema has drifted beyond known variants and needs human attention.
pub fn parse_series_header(header: &StringRecord) -> Result<SeriesHeader> {
    if header.len() < SERIES_PREFIX.len() + 1 {
        bail!(
            "time-series header has {} columns, expected at least {}",
            header.len(),
            SERIES_PREFIX.len() + 1
        );
    }
    for (position, expected) in SERIES_PREFIX.iter().enumerate() {
        let got = clean(&header[position]);
        if got != *expected {
            bail!("time-series header column {position} is {got:?}, expected {expected:?}");
        }
    }

    let dates = header
        .iter()
        .skip(SERIES_PREFIX.len())
        .map(|cell| {
            let cell = clean(cell);
            NaiveDate::parse_from_str(cell, "%m/%d/%y")
                .map_err(|e| anyhow!("bad date column {cell:?} in time-series header: {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SeriesHeader { dates })
}

impl SeriesHeader {
    /// Extracts the geographic fields and the per-date cumulative counts
    /// from one data row. Cells that do not parse as integers come back as
    /// `None`; blank placeholders are expected, not errors.
    pub fn extract(&self, record: &StringRecord) -> (GeoFields, Vec<Option<i64>>) {
        let fields = GeoFields {
            state: clean(&record[0]).to_string(),
            country: clean(&record[1]).to_string(),
            lat: clean(&record[2]).to_string(),
            long: clean(&record[3]).to_string(),
            county: String::new(),
            had_county_column: false,
        };
        let counts = record
            .iter()
            .skip(SERIES_PREFIX.len())
            .take(self.dates.len())
            .map(parse_count)
            .collect();
        (fields, counts)
    }
}

/// Resolved column positions for one daily-report file.
#[derive(Debug)]
pub struct DailyHeader {
    county: Option<usize>,
    state: usize,
    country: usize,
    lat: Option<usize>,
    long: Option<usize>,
    confirmed: usize,
    deaths: usize,
}

/// One parsed daily-report row: geographic fields plus the day's
/// cumulative counts.
#[derive(Debug)]
pub struct DailyRow {
    pub fields: GeoFields,
    pub confirmed: i64,
    pub deaths: i64,
}

/// Resolves a daily-report header against the synonym table.
///
/// state, country, confirmed, and deaths must all resolve; a header missing
/// any of them is a fatal format error. county, latitude, and longitude are
/// optional (early files had none).
pub fn parse_daily_header(header: &StringRecord) -> Result<DailyHeader> {
    let mut positions: [Option<usize>; 7] = [None; 7];

    for (position, cell) in header.iter().enumerate() {
        let name = clean(cell).to_lowercase();
        if let Some((_, field)) = COLUMN_SYNONYMS.iter().find(|(syn, _)| *syn == name) {
            let slot = &mut positions[*field as usize];
            // First occurrence wins if a file ever repeats a synonym.
            if slot.is_none() {
                *slot = Some(position);
            }
        }
    }

    let required = |field: Field| {
        positions[field as usize]
            .ok_or_else(|| anyhow!("daily header missing required column for {field:?}"))
    };

    Ok(DailyHeader {
        county: positions[Field::County as usize],
        state: required(Field::State)?,
        country: required(Field::Country)?,
        lat: positions[Field::Latitude as usize],
        long: positions[Field::Longitude as usize],
        confirmed: required(Field::Confirmed)?,
        deaths: required(Field::Deaths)?,
    })
}

impl DailyHeader {
    /// Extracts one data row, or `None` when confirmed or deaths is not an
    /// integer (blank placeholder rows are silently skipped).
    pub fn extract(&self, record: &StringRecord) -> Option<DailyRow> {
        let confirmed = parse_count(&record[self.confirmed]);
        let deaths = parse_count(&record[self.deaths]);
        let (Some(confirmed), Some(deaths)) = (confirmed, deaths) else {
            trace!("Skipping row with non-numeric count cells");
            return None;
        };

        let cell = |idx: Option<usize>| {
            idx.map(|i| clean(&record[i]).to_string())
                .unwrap_or_default()
        };

        Some(DailyRow {
            fields: GeoFields {
                county: cell(self.county),
                state: clean(&record[self.state]).to_string(),
                country: clean(&record[self.country]).to_string(),
                lat: cell(self.lat),
                long: cell(self.long),
                had_county_column: self.county.is_some(),
            },
            confirmed,
            deaths,
        })
    }
}
