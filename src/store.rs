//! The aggregation store: a date-indexed time series of cumulative counts
//! per geographic key.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::geo::GeoKey;

/// Which cumulative counter an incoming value adds to. The series variant
/// delivers each metric in its own source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

/// Cumulative counters for one key at one date index.
///
/// Latitude and longitude ride along as raw text (early files had none, and
/// the values are display-only). Every merge overwrites them, so the last
/// source row seen for a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub lat: String,
    pub long: String,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
}

impl Observation {
    fn add(&mut self, metric: Metric, value: i64) {
        match metric {
            Metric::Confirmed => self.confirmed += value,
            Metric::Deaths => self.deaths += value,
            Metric::Recovered => self.recovered += value,
        }
    }
}

/// Ordered sequence of per-date maps from key to observation.
///
/// Date index 0 is `epoch`. The BTreeMap keeps keys in (country, state,
/// county) order, which is exactly the serializer's sort order.
pub struct TimeSeries {
    epoch: NaiveDate,
    days: Vec<BTreeMap<GeoKey, Observation>>,
}

impl TimeSeries {
    pub fn new(epoch: NaiveDate) -> Self {
        TimeSeries {
            epoch,
            days: Vec::new(),
        }
    }

    /// Calendar date for a date index.
    pub fn date_for(&self, date_index: usize) -> NaiveDate {
        self.epoch + chrono::Days::new(date_index as u64)
    }

    /// Highest date index that has been touched, or `None` when empty.
    pub fn max_date_index(&self) -> Option<usize> {
        self.days.len().checked_sub(1)
    }

    pub fn day(&self, date_index: usize) -> Option<&BTreeMap<GeoKey, Observation>> {
        self.days.get(date_index)
    }

    /// Additively merges `value` into the `metric` counter for
    /// `(date_index, key)`, creating a zeroed observation if absent.
    ///
    /// Never decrements a stored counter on its own; callers are expected to
    /// invoke this exactly once per source row. There is no dedup, and
    /// calling twice double-counts by design (that is how counts from
    /// multiple source files covering the same key combine).
    pub fn add(
        &mut self,
        date_index: usize,
        key: GeoKey,
        lat: &str,
        long: &str,
        metric: Metric,
        value: i64,
    ) {
        if self.days.len() <= date_index {
            // Grow through the gap; skipped indices stay as empty maps so
            // the backward lookback sees them as "key absent", not a hole.
            self.days.resize_with(date_index + 1, BTreeMap::new);
        }
        let obs = self.days[date_index].entry(key).or_default();
        obs.add(metric, value);
        obs.lat = lat.to_string();
        obs.long = long.to_string();
    }

    /// Most recent record for `key` strictly before `date_index`, scanning
    /// backward and skipping dates where the key did not report.
    ///
    /// Linear in the date range per call; fine at this data's scale (low
    /// thousands of keys, hundreds of dates). If that ever changes, keep
    /// the last two (index, observation) pairs per key during ingestion
    /// instead of scanning here.
    pub fn previous(&self, date_index: usize, key: &GeoKey) -> Option<(usize, &Observation)> {
        self.days[..date_index.min(self.days.len())]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, day)| day.get(key).map(|obs| (idx, obs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 22).unwrap()
    }

    fn key(country: &str) -> GeoKey {
        GeoKey::new(country, "", "")
    }

    #[test]
    fn test_add_creates_zeroed_then_increments() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(0, key("US"), "40.0", "-75.0", Metric::Confirmed, 5);
        let obs = ts.day(0).unwrap().get(&key("US")).unwrap();
        assert_eq!(obs.confirmed, 5);
        assert_eq!(obs.deaths, 0);
        assert_eq!(obs.lat, "40.0");
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(3, key("US"), "", "", Metric::Confirmed, 7);
        ts.add(3, key("US"), "", "", Metric::Confirmed, 11);
        ts.add(3, key("US"), "", "", Metric::Deaths, 2);
        ts.add(3, key("US"), "", "", Metric::Deaths, 3);
        let obs = ts.day(3).unwrap().get(&key("US")).unwrap();
        assert_eq!(obs.confirmed, 18);
        assert_eq!(obs.deaths, 5);
    }

    #[test]
    fn test_last_written_lat_long_wins() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(0, key("US"), "1.0", "2.0", Metric::Confirmed, 1);
        ts.add(0, key("US"), "3.0", "4.0", Metric::Deaths, 1);
        let obs = ts.day(0).unwrap().get(&key("US")).unwrap();
        assert_eq!(obs.lat, "3.0");
        assert_eq!(obs.long, "4.0");
    }

    #[test]
    fn test_gap_fill_on_growth() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(4, key("US"), "", "", Metric::Confirmed, 1);
        assert_eq!(ts.max_date_index(), Some(4));
        for idx in 0..4 {
            assert!(ts.day(idx).unwrap().is_empty());
        }
    }

    #[test]
    fn test_previous_skips_absent_dates() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(2, key("US"), "", "", Metric::Confirmed, 10);
        ts.add(5, key("US"), "", "", Metric::Confirmed, 25);
        let (idx, obs) = ts.previous(5, &key("US")).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(obs.confirmed, 10);
    }

    #[test]
    fn test_previous_none_without_history() {
        let mut ts = TimeSeries::new(epoch());
        ts.add(2, key("US"), "", "", Metric::Confirmed, 10);
        assert!(ts.previous(2, &key("US")).is_none());
        assert!(ts.previous(0, &key("US")).is_none());
    }

    #[test]
    fn test_date_for() {
        let ts = TimeSeries::new(epoch());
        assert_eq!(
            ts.date_for(1),
            NaiveDate::from_ymd_opt(2020, 1, 23).unwrap()
        );
    }
}
