//! Geographic keys and naming normalization.
//!
//! Source files spell the same reporting entity several ways across
//! history ("Mainland China" vs "China", "Cook County, IL" packed into the
//! state column, two-letter state codes). Everything here rewrites raw
//! fields into one canonical form before a key is built.

use std::collections::HashMap;

/// Identifying tuple for a reporting entity.
///
/// Field order matters: the derived `Ord` compares country, then state,
/// then county, which is the sort order of the rendered CSV. Latitude and
/// longitude are descriptive, not identifying, and live on
/// [`crate::store::Observation`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeoKey {
    pub country: String,
    pub state: String,
    pub county: String,
}

impl GeoKey {
    pub fn new(country: &str, state: &str, county: &str) -> Self {
        GeoKey {
            country: country.to_string(),
            state: state.to_string(),
            county: county.to_string(),
        }
    }
}

/// Country names that changed in the source data mid-series, mapped to the
/// spelling used from then on.
static COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("Mainland China", "China"),
    ("South Korea", "Korea, South"),
];

/// Two-letter US postal codes, the 50 states plus DC and the territories
/// that appear in the data.
static US_STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
    ("DC", "District of Columbia"),
    ("D.C.", "District of Columbia"),
    ("PR", "Puerto Rico"),
    ("GU", "Guam"),
    ("VI", "Virgin Islands"),
    ("AS", "American Samoa"),
    ("MP", "Northern Mariana Islands"),
];

/// One raw row's geographic fields after column extraction, before key
/// construction. `had_county_column` records whether the source file had a
/// dedicated county column, which gates the comma-splitting rewrite.
#[derive(Debug, Clone, Default)]
pub struct GeoFields {
    pub country: String,
    pub state: String,
    pub county: String,
    pub lat: String,
    pub long: String,
    pub had_county_column: bool,
}

/// Canonicalizes geographic naming. Lookup maps are built once from the
/// static tables and the normalizer is passed by reference into the
/// ingestion pass.
pub struct Normalizer {
    aliases: HashMap<String, &'static str>,
    abbreviations: HashMap<String, &'static str>,
}

impl Normalizer {
    pub fn new() -> Self {
        let aliases = COUNTRY_ALIASES
            .iter()
            .map(|(from, to)| (from.to_lowercase(), *to))
            .collect();
        let abbreviations = US_STATE_ABBREVIATIONS
            .iter()
            .map(|(code, name)| (code.to_lowercase(), *name))
            .collect();
        Normalizer {
            aliases,
            abbreviations,
        }
    }

    /// Applies the rewrite steps in order. Order is load-bearing: the
    /// county/state split reads the raw comma-bearing state string, and the
    /// Virgin Islands promotion reads the split's output.
    pub fn normalize(&self, fields: &mut GeoFields) {
        self.rewrite_country_alias(fields);
        self.split_us_county_state(fields);
        self.promote_virgin_islands(fields);
    }

    fn rewrite_country_alias(&self, fields: &mut GeoFields) {
        if let Some(canonical) = self.aliases.get(&fields.country.to_lowercase()) {
            fields.country = canonical.to_string();
        }
    }

    /// Early US rows packed "County, ST" into the state column. Splits on
    /// the first comma, strips a trailing " County" suffix, and expands the
    /// postal code. Unrecognized codes pass through unchanged.
    fn split_us_county_state(&self, fields: &mut GeoFields) {
        if fields.had_county_column || !fields.country.eq_ignore_ascii_case("US") {
            return;
        }
        let Some((raw_county, raw_state)) = fields.state.split_once(',') else {
            return;
        };

        let mut county = raw_county.trim().to_string();
        if county.to_lowercase().ends_with(" county") {
            county.truncate(county.len() - " county".len());
        }

        let code = raw_state.trim();
        let state = self
            .abbreviations
            .get(&code.to_lowercase())
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.to_string());

        fields.county = county;
        fields.state = state;
    }

    /// "Virgin Islands, U.S." landed in the county slot in some files; it
    /// is a territory, not a county.
    fn promote_virgin_islands(&self, fields: &mut GeoFields) {
        if fields.country.eq_ignore_ascii_case("US")
            && fields.county.eq_ignore_ascii_case("Virgin Islands")
        {
            fields.state = "Virgin Islands".to_string();
            fields.county.clear();
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us_row(state: &str) -> GeoFields {
        GeoFields {
            country: "US".to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_ordering_country_then_state_then_county() {
        let mut keys = vec![
            GeoKey::new("US", "Illinois", "Cook"),
            GeoKey::new("Canada", "Ontario", ""),
            GeoKey::new("US", "Alabama", ""),
            GeoKey::new("US", "Illinois", "Adams"),
        ];
        keys.sort();
        assert_eq!(keys[0], GeoKey::new("Canada", "Ontario", ""));
        assert_eq!(keys[1], GeoKey::new("US", "Alabama", ""));
        assert_eq!(keys[2], GeoKey::new("US", "Illinois", "Adams"));
        assert_eq!(keys[3], GeoKey::new("US", "Illinois", "Cook"));
    }

    #[test]
    fn test_sorting_is_deterministic() {
        let keys = vec![
            GeoKey::new("Italy", "", ""),
            GeoKey::new("China", "Hubei", ""),
            GeoKey::new("China", "Beijing", ""),
        ];
        let mut a = keys.clone();
        let mut b = keys;
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mainland_china_alias() {
        let norm = Normalizer::new();
        let mut fields = GeoFields {
            country: "Mainland China".to_string(),
            state: "Hubei".to_string(),
            ..Default::default()
        };
        norm.normalize(&mut fields);
        assert_eq!(fields.country, "China");
        assert_eq!(fields.state, "Hubei");
    }

    #[test]
    fn test_south_korea_alias_case_insensitive() {
        let norm = Normalizer::new();
        let mut fields = GeoFields {
            country: "south korea".to_string(),
            ..Default::default()
        };
        norm.normalize(&mut fields);
        assert_eq!(fields.country, "Korea, South");
    }

    #[test]
    fn test_cook_il_splits_into_county_and_state() {
        let norm = Normalizer::new();
        let mut fields = us_row("Cook, IL");
        norm.normalize(&mut fields);
        assert_eq!(fields.county, "Cook");
        assert_eq!(fields.state, "Illinois");
    }

    #[test]
    fn test_county_suffix_stripped() {
        let norm = Normalizer::new();
        let mut fields = us_row("Westchester County, NY");
        norm.normalize(&mut fields);
        assert_eq!(fields.county, "Westchester");
        assert_eq!(fields.state, "New York");
    }

    #[test]
    fn test_unknown_abbreviation_passes_through() {
        let norm = Normalizer::new();
        let mut fields = us_row("Somewhere, ZZ");
        norm.normalize(&mut fields);
        assert_eq!(fields.county, "Somewhere");
        assert_eq!(fields.state, "ZZ");
    }

    #[test]
    fn test_no_split_when_county_column_present() {
        let norm = Normalizer::new();
        let mut fields = us_row("Cook, IL");
        fields.had_county_column = true;
        norm.normalize(&mut fields);
        assert_eq!(fields.state, "Cook, IL");
        assert_eq!(fields.county, "");
    }

    #[test]
    fn test_no_split_outside_us() {
        let norm = Normalizer::new();
        let mut fields = GeoFields {
            country: "Korea, South".to_string(),
            state: "Seoul, North".to_string(),
            ..Default::default()
        };
        norm.normalize(&mut fields);
        assert_eq!(fields.state, "Seoul, North");
    }

    #[test]
    fn test_virgin_islands_promoted_to_state() {
        let norm = Normalizer::new();
        let mut fields = us_row("Virgin Islands, VI");
        norm.normalize(&mut fields);
        assert_eq!(fields.county, "");
        assert_eq!(fields.state, "Virgin Islands");
    }
}
