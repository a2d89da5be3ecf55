//! Derived time-series metrics: day-over-day news and second-order deltas.
//!
//! Regions report intermittently, so "previous record" means the most
//! recent earlier date index at which the key appears, not the previous
//! calendar day. The store's backward scan handles the skipping.

use crate::geo::GeoKey;
use crate::store::{Observation, TimeSeries};

/// How many prior records the delta formulas reach back through. Output
/// starts at this date index so every emitted row has the history its
/// formulas need; the constant tracks the formula depth, not the epoch.
pub const LOOKBACK_STEPS: usize = 2;

/// New-count and second-order deltas for one (date index, key) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Derived {
    pub new_confirmed: i64,
    pub new_deaths: i64,
    pub new_recovered: i64,
    pub delta_confirmed: i64,
    pub delta_deaths: i64,
}

/// Computes the derived metrics for `key` at `date_index`.
///
/// `new_*` is the change since the key's most recent earlier record (zero
/// history counts as zero). `delta_*` is the change in `new_*` relative to
/// the step before that, which needs a second backward scan past `t_prev`.
pub fn derive(ts: &TimeSeries, date_index: usize, key: &GeoKey, obs: &Observation) -> Derived {
    static ZERO: Observation = Observation {
        lat: String::new(),
        long: String::new(),
        confirmed: 0,
        deaths: 0,
        recovered: 0,
    };

    let (prev_index, prev) = match ts.previous(date_index, key) {
        Some((idx, obs)) => (Some(idx), obs),
        None => (None, &ZERO),
    };
    let prev_prev = prev_index
        .and_then(|idx| ts.previous(idx, key))
        .map(|(_, obs)| obs)
        .unwrap_or(&ZERO);

    let new_confirmed = obs.confirmed - prev.confirmed;
    let new_deaths = obs.deaths - prev.deaths;

    Derived {
        new_confirmed,
        new_deaths,
        new_recovered: obs.recovered - prev.recovered,
        delta_confirmed: new_confirmed - (prev.confirmed - prev_prev.confirmed),
        delta_deaths: new_deaths - (prev.deaths - prev_prev.deaths),
    }
}
