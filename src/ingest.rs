//! Ingestion pipelines: fetch, parse, normalize, and aggregate source
//! files into per-dataset stores.
//!
//! Both pipelines are strictly sequential: each file is fetched and fully
//! parsed before the next begins. Each accepted row fans out to every
//! configured dataset.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::dataset::DatasetPolicy;
use crate::fetch::{HttpClient, fetch_optional, fetch_required};
use crate::geo::{GeoFields, GeoKey, Normalizer};
use crate::parser::{csv_reader, parse_daily_header, parse_series_header};
use crate::store::{Metric, TimeSeries};

/// Epoch of the fixed time-series files: date index 0 is 2020-01-22, the
/// first column those files ever carried.
pub fn series_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 22).expect("valid epoch date")
}

/// The three fixed cumulative time-series source files, one per metric.
static SERIES_FILES: &[(&str, Metric)] = &[
    ("time_series_19-covid-Confirmed.csv", Metric::Confirmed),
    ("time_series_19-covid-Deaths.csv", Metric::Deaths),
    ("time_series_19-covid-Recovered.csv", Metric::Recovered),
];

/// One configured dataset and the store its accepted rows accumulate into.
pub struct DatasetBuild {
    pub policy: DatasetPolicy,
    pub series: TimeSeries,
}

/// Result of one ingestion pass: the per-dataset stores plus the last
/// calendar date the sources actually covered.
///
/// `last_date` tracks the data itself, not any one dataset's store: a
/// probed daily file whose rows all fail a dataset's filters still counts,
/// so the external "last updated" marker never under-reports.
pub struct IngestOutcome {
    pub builds: Vec<DatasetBuild>,
    pub last_date: Option<NaiveDate>,
}

fn new_builds(datasets: Vec<DatasetPolicy>, epoch: NaiveDate) -> Vec<DatasetBuild> {
    datasets
        .into_iter()
        .map(|policy| DatasetBuild {
            policy,
            series: TimeSeries::new(epoch),
        })
        .collect()
}

/// Applies filter, granularity masking, and storage for one row across all
/// datasets. `counts` carries (metric, value) pairs so one call covers both
/// the single-metric series files and the two-metric daily rows.
fn fan_out(
    builds: &mut [DatasetBuild],
    fields: &GeoFields,
    date_index: usize,
    counts: &[(Metric, i64)],
) {
    for build in builds.iter_mut() {
        if !build.policy.accepts(fields) {
            continue;
        }
        let mut masked = fields.clone();
        build.policy.mask(&mut masked);
        let key = GeoKey::new(&masked.country, &masked.state, &masked.county);
        for (metric, value) in counts {
            build.series.add(
                date_index,
                key.clone(),
                &masked.lat,
                &masked.long,
                *metric,
                *value,
            );
        }
    }
}

/// Ingests the three fixed cumulative time-series files.
///
/// Each file's date columns merge additively into the same stores, so the
/// three metrics land on one observation per (date, key). All three files
/// must exist.
#[tracing::instrument(skip(client, datasets))]
pub async fn ingest_series<C: HttpClient>(
    client: &C,
    source: &str,
    datasets: Vec<DatasetPolicy>,
) -> Result<IngestOutcome> {
    let epoch = series_epoch();
    let mut builds = new_builds(datasets, epoch);
    let mut last_date: Option<NaiveDate> = None;

    for (name, metric) in SERIES_FILES.iter().copied() {
        let bytes = fetch_required(client, source, name).await?;
        let mut rdr = csv_reader(&bytes);
        let mut records = rdr.records();

        let header = match records.next() {
            Some(header) => header?,
            None => bail!("{name} is empty"),
        };
        let header = parse_series_header(&header)?;

        let mut indices = Vec::with_capacity(header.dates.len());
        for date in &header.dates {
            let offset = (*date - epoch).num_days();
            if offset < 0 {
                bail!("{name} has date column {date} before the {epoch} epoch");
            }
            indices.push(offset as usize);
            last_date = last_date.max(Some(*date));
        }

        let mut row_count = 0usize;
        for record in records {
            let record = record?;
            let (fields, counts) = header.extract(&record);
            row_count += 1;

            for (slot, value) in counts.into_iter().enumerate() {
                // Blank cells are placeholders, not zeros; skip them.
                let Some(value) = value else { continue };
                fan_out(&mut builds, &fields, indices[slot], &[(metric, value)]);
            }
        }

        info!(file = name, rows = row_count, "Time-series file ingested");
    }

    Ok(IngestOutcome { builds, last_date })
}

/// Ingests daily report files, probing `MM-DD-YYYY.csv` from `start`
/// forward until a file is missing, which is the normal stopping condition
/// rather than an error. Rows pass through the geographic normalizer
/// before fan-out.
#[tracing::instrument(skip(client, normalizer, datasets), fields(start = %start))]
pub async fn ingest_daily<C: HttpClient>(
    client: &C,
    source: &str,
    start: NaiveDate,
    normalizer: &Normalizer,
    datasets: Vec<DatasetPolicy>,
) -> Result<IngestOutcome> {
    let mut builds = new_builds(datasets, start);
    let mut last_date: Option<NaiveDate> = None;

    for date_index in 0usize.. {
        let date = start + chrono::Days::new(date_index as u64);
        let name = format!("{}.csv", date.format("%m-%d-%Y"));

        let Some(bytes) = fetch_optional(client, source, &name).await? else {
            info!(files = date_index, "No more daily files; ingestion complete");
            break;
        };
        last_date = Some(date);

        let mut rdr = csv_reader(&bytes);
        let mut records = rdr.records();
        let header = match records.next() {
            Some(header) => header?,
            None => bail!("{name} is empty"),
        };
        let header = parse_daily_header(&header)?;

        let mut stored = 0usize;
        let mut skipped = 0usize;
        for record in records {
            let record = record?;
            let Some(mut row) = header.extract(&record) else {
                skipped += 1;
                continue;
            };
            normalizer.normalize(&mut row.fields);
            fan_out(
                &mut builds,
                &row.fields,
                date_index,
                &[(Metric::Confirmed, row.confirmed), (Metric::Deaths, row.deaths)],
            );
            stored += 1;
        }

        debug!(file = %name, stored, skipped, "Daily file ingested");
    }

    Ok(IngestOutcome { builds, last_date })
}
