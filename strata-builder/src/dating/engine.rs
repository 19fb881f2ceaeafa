//! Germination-year and felling-year estimate derivation
//!
//! Four queries over one series of keyed dendro measurements: the oldest
//! and youngest bound of the germination year, and the oldest and youngest
//! bound of the felling year. Reliability tiers:
//!
//! 1. direct measurement
//! 2. felling year minus stated tree age
//! 3. felling year minus ring count minus distance to pith
//!    (or, for felling: growth year plus tree age)
//! 4. felling year minus ring count alone (explicitly flagged as weak)

use super::{keys, pith};
use serde::Serialize;
use std::collections::BTreeMap;

/// One dataset's keyed dendro measurements, the engine's input view.
#[derive(Debug, Clone, Default)]
pub struct DendroSeries {
    values: BTreeMap<String, String>,
    felling: Option<FellingYear>,
}

impl DendroSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_felling(&mut self, felling: FellingYear) {
        self.felling = Some(felling);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn felling(&self) -> Option<&FellingYear> {
        self.felling.as_ref()
    }

    fn parse_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(parse_year)
    }
}

/// The "Estimated felling year" record.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct FellingYear {
    pub older: Option<i32>,
    pub younger: Option<i32>,
    /// Age-type tag on the record; anything but calendar years AD warns.
    pub age_type: Option<String>,
    /// Stated dating uncertainty, e.g. "ca".
    pub uncertainty: Option<String>,
    pub error_plus: Option<i32>,
    pub error_minus: Option<i32>,
}

const SUPPORTED_AGE_TYPE: &str = "AD";

/// A derived dating estimate. `value` is `None` when no inference was
/// possible; `formula` always names the path taken.
#[derive(Debug, Clone, Serialize)]
pub struct DatingEstimate {
    pub value: Option<i32>,
    pub formula: String,
    pub reliability: u8,
    pub warnings: Vec<String>,
}

impl DatingEstimate {
    fn derived(value: i32, formula: &str, reliability: u8, warnings: Vec<String>) -> Self {
        Self {
            value: Some(value),
            formula: formula.to_string(),
            reliability,
            warnings,
        }
    }

    fn null(formula: &str) -> Self {
        Self {
            value: None,
            formula: formula.to_string(),
            reliability: 4,
            warnings: Vec::new(),
        }
    }
}

/// Which bound of an interval a derivation targets. Older bounds apply the
/// minus error margin, younger bounds the plus margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Older,
    Younger,
}

/// Oldest possible germination year.
///
/// The direct lower-bound measurement decides this query outright: when the
/// key is present the function returns its parse result, and when it is
/// absent only the felling-year presence check runs before returning null.
/// The derivation chain in [`derive_germination`] is deliberately left
/// unreached on this path (preserved behavior, recorded in DESIGN.md).
pub fn oldest_germination_year(series: &DendroSeries) -> DatingEstimate {
    if let Some(raw) = series.get(keys::INFERRED_GROWTH_YEAR_LOWER) {
        return match parse_year(raw) {
            Some(year) => DatingEstimate::derived(year, keys::INFERRED_GROWTH_YEAR_LOWER, 1, vec![]),
            None => DatingEstimate::null("Inferred growth year (lower bound) not parseable"),
        };
    }

    if series.felling().is_none() {
        return DatingEstimate::null("No felling year estimate available");
    }
    DatingEstimate::null("No direct growth year measurement")
}

/// Youngest possible germination year. Direct upper-bound measurement
/// first, then the felling-year derivation chain.
pub fn youngest_germination_year(series: &DendroSeries) -> DatingEstimate {
    if let Some(year) = series.parse_int(keys::INFERRED_GROWTH_YEAR_UPPER) {
        return DatingEstimate::derived(year, keys::INFERRED_GROWTH_YEAR_UPPER, 1, vec![]);
    }
    derive_germination(series, Bound::Younger)
}

/// Oldest possible felling year: the felling record's older bound, its
/// younger bound with a warning, or growth year plus tree age.
pub fn oldest_felling_year(series: &DendroSeries) -> DatingEstimate {
    if let Some(felling) = series.felling() {
        let mut warnings = felling_warnings(felling, Bound::Older);
        if let Some(older) = felling.older {
            return DatingEstimate::derived(older, "Estimated felling year (older bound)", 1, warnings);
        }
        if let Some(younger) = felling.younger {
            warnings.push("Only the younger felling bound is available".to_string());
            return DatingEstimate::derived(
                younger,
                "Estimated felling year (younger bound)",
                2,
                warnings,
            );
        }
    }

    if let (Some(growth), Some(age)) = (
        series.parse_int(keys::INFERRED_GROWTH_YEAR_UPPER),
        series.parse_int(keys::TREE_AGE_UPPER),
    ) {
        return DatingEstimate::derived(
            growth + age,
            "Inferred growth year (upper bound) + tree age (upper bound)",
            3,
            vec![],
        );
    }

    DatingEstimate::null("No felling year estimate available")
}

/// Youngest possible felling year, mirrored bounds.
pub fn youngest_felling_year(series: &DendroSeries) -> DatingEstimate {
    if let Some(felling) = series.felling() {
        let mut warnings = felling_warnings(felling, Bound::Younger);
        if let Some(younger) = felling.younger {
            return DatingEstimate::derived(
                younger,
                "Estimated felling year (younger bound)",
                1,
                warnings,
            );
        }
        if let Some(older) = felling.older {
            warnings.push("Only the older felling bound is available".to_string());
            return DatingEstimate::derived(older, "Estimated felling year (older bound)", 2, warnings);
        }
    }

    if let (Some(growth), Some(age)) = (
        series.parse_int(keys::INFERRED_GROWTH_YEAR_LOWER),
        series.parse_int(keys::TREE_AGE_LOWER),
    ) {
        return DatingEstimate::derived(
            growth + age,
            "Inferred growth year (lower bound) + tree age (lower bound)",
            3,
            vec![],
        );
    }

    DatingEstimate::null("No felling year estimate available")
}

/// Shared fallback chain: germination = felling year minus an age measure,
/// at decreasing reliability.
fn derive_germination(series: &DendroSeries, bound: Bound) -> DatingEstimate {
    let Some(felling) = series.felling() else {
        return DatingEstimate::null("No felling year estimate available");
    };
    let mut warnings = felling_warnings(felling, bound);

    let base = match bound {
        Bound::Older => felling.older.or(felling.younger),
        Bound::Younger => felling.younger.or(felling.older),
    };
    let Some(base) = base else {
        return DatingEstimate::null("Felling year record carries no year");
    };

    let age_key = match bound {
        Bound::Older => keys::TREE_AGE_UPPER,
        Bound::Younger => keys::TREE_AGE_LOWER,
    };
    if let Some(age) = series.parse_int(age_key) {
        return DatingEstimate::derived(
            base - age,
            "Estimated felling year − tree age",
            2,
            warnings,
        );
    }

    let rings = series.parse_int(keys::TREE_RINGS);
    if let (Some(rings), Some(raw)) = (rings, series.get(keys::DISTANCE_TO_PITH)) {
        let parsed = pith::parse(raw);
        if let Some(note) = &parsed.note {
            warnings.push(format!("Distance to pith: {}", note));
        }
        // A range encodes the pith distance's own bounds; pick the one
        // matching the requested estimate.
        let distance = match bound {
            Bound::Older => parsed.upper.or(parsed.value),
            Bound::Younger => parsed.lower.or(parsed.value),
        };
        if let Some(distance) = distance {
            return DatingEstimate::derived(
                base - rings - distance.round() as i32,
                "Estimated felling year − tree rings − distance to pith",
                3,
                warnings,
            );
        }
    }

    if let Some(rings) = rings {
        warnings.push(
            "Weak inference: ring count without distance to pith underestimates tree age"
                .to_string(),
        );
        return DatingEstimate::derived(
            base - rings,
            "Estimated felling year − tree rings",
            4,
            warnings,
        );
    }

    DatingEstimate::null("No tree age, ring count, or pith measurements")
}

/// Warnings shared by every felling-record derivation: unsupported age-type
/// tags, stated uncertainty, and the signed error margin for the bound.
fn felling_warnings(felling: &FellingYear, bound: Bound) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(age_type) = &felling.age_type {
        if age_type != SUPPORTED_AGE_TYPE {
            warnings.push(format!("Unsupported age type: {}", age_type));
        }
    }
    if let Some(uncertainty) = &felling.uncertainty {
        warnings.push(format!("Dating uncertainty: {}", uncertainty));
    }
    match bound {
        Bound::Older => {
            if let Some(minus) = felling.error_minus {
                warnings.push(format!("Error margin: -{} years", minus));
            }
        }
        Bound::Younger => {
            if let Some(plus) = felling.error_plus {
                warnings.push(format!("Error margin: +{} years", plus));
            }
        }
    }
    warnings
}

/// Lenient integer-year parse; tolerates surrounding whitespace.
fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn felling(older: Option<i32>, younger: Option<i32>) -> FellingYear {
        FellingYear {
            older,
            younger,
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_germination_lower_bound() {
        let mut series = DendroSeries::new();
        series.insert(keys::INFERRED_GROWTH_YEAR_LOWER, "845");
        let estimate = oldest_germination_year(&series);
        assert_eq!(estimate.value, Some(845));
        assert_eq!(estimate.reliability, 1);
        assert!(estimate.warnings.is_empty());
    }

    #[test]
    fn test_oldest_germination_never_reaches_fallbacks() {
        // Felling year and ring data are present but the oldest bound only
        // consults the direct measurement.
        let mut series = DendroSeries::new();
        series.set_felling(felling(Some(1200), None));
        series.insert(keys::TREE_RINGS, "120");
        let estimate = oldest_germination_year(&series);
        assert_eq!(estimate.value, None);
    }

    #[test]
    fn test_oldest_germination_unparseable_direct_value_is_null() {
        let mut series = DendroSeries::new();
        series.insert(keys::INFERRED_GROWTH_YEAR_LOWER, "ca 845");
        series.set_felling(felling(Some(1200), None));
        let estimate = oldest_germination_year(&series);
        assert_eq!(estimate.value, None);
    }

    #[test]
    fn test_oldest_felling_prefers_older_bound() {
        let mut series = DendroSeries::new();
        series.set_felling(felling(Some(1200), None));
        let estimate = oldest_felling_year(&series);
        assert_eq!(estimate.value, Some(1200));
        assert_eq!(estimate.reliability, 1);
    }

    #[test]
    fn test_youngest_felling_falls_back_to_older_with_warning() {
        let mut series = DendroSeries::new();
        series.set_felling(felling(Some(1200), None));
        let estimate = youngest_felling_year(&series);
        assert_eq!(estimate.value, Some(1200));
        assert_eq!(estimate.reliability, 2);
        assert!(estimate
            .warnings
            .iter()
            .any(|w| w.contains("older felling bound")));
    }

    #[test]
    fn test_felling_from_growth_plus_age() {
        let mut series = DendroSeries::new();
        series.insert(keys::INFERRED_GROWTH_YEAR_UPPER, "1050");
        series.insert(keys::TREE_AGE_UPPER, "150");
        let estimate = oldest_felling_year(&series);
        assert_eq!(estimate.value, Some(1200));
        assert_eq!(estimate.reliability, 3);
    }

    #[test]
    fn test_youngest_germination_tree_age_fallback() {
        let mut series = DendroSeries::new();
        series.set_felling(felling(None, Some(1320)));
        series.insert(keys::TREE_AGE_LOWER, "90");
        let estimate = youngest_germination_year(&series);
        assert_eq!(estimate.value, Some(1230));
        assert_eq!(estimate.reliability, 2);
    }

    #[test]
    fn test_youngest_germination_rings_and_pith() {
        let mut series = DendroSeries::new();
        series.set_felling(felling(None, Some(1320)));
        series.insert(keys::TREE_RINGS, "100");
        series.insert(keys::DISTANCE_TO_PITH, "12-20");
        let estimate = youngest_germination_year(&series);
        // Younger bound uses the range's lower value: 1320 - 100 - 12
        assert_eq!(estimate.value, Some(1208));
        assert_eq!(estimate.reliability, 3);
    }

    #[test]
    fn test_youngest_germination_rings_alone_is_weakest() {
        let mut series = DendroSeries::new();
        series.set_felling(felling(None, Some(1320)));
        series.insert(keys::TREE_RINGS, "100");
        let estimate = youngest_germination_year(&series);
        assert_eq!(estimate.value, Some(1220));
        assert_eq!(estimate.reliability, 4);
        assert!(estimate.warnings.iter().any(|w| w.contains("Weak inference")));
    }

    #[test]
    fn test_felling_record_warnings_accumulate() {
        let mut series = DendroSeries::new();
        series.set_felling(FellingYear {
            older: Some(1200),
            younger: None,
            age_type: Some("BP".to_string()),
            uncertainty: Some("ca".to_string()),
            error_minus: Some(10),
            error_plus: Some(5),
        });
        let estimate = oldest_felling_year(&series);
        assert_eq!(estimate.value, Some(1200));
        assert!(estimate.warnings.iter().any(|w| w.contains("Unsupported age type")));
        assert!(estimate.warnings.iter().any(|w| w.contains("Dating uncertainty")));
        // Older bound applies the minus margin only
        assert!(estimate.warnings.iter().any(|w| w.contains("-10 years")));
        assert!(!estimate.warnings.iter().any(|w| w.contains("+5 years")));
    }

    #[test]
    fn test_no_data_yields_null() {
        let series = DendroSeries::new();
        for estimate in [
            oldest_germination_year(&series),
            youngest_germination_year(&series),
            oldest_felling_year(&series),
            youngest_felling_year(&series),
        ] {
            assert_eq!(estimate.value, None);
            assert!(!estimate.formula.is_empty());
        }
    }
}
