//! Dendrochronological age inference
//!
//! Pure function library deriving germination-year and felling-year
//! estimates from keyed measurement records. Every derived value carries a
//! reliability tier (1 = direct measurement, 4 = weakest multi-step
//! inference) and the warnings accumulated while deriving it.

pub mod engine;
pub mod pith;
pub mod timespan;

pub use engine::{
    oldest_felling_year, oldest_germination_year, youngest_felling_year,
    youngest_germination_year, DatingEstimate, DendroSeries, FellingYear,
};

/// Measurement keys recognized by the inference engine.
pub mod keys {
    pub const INFERRED_GROWTH_YEAR_LOWER: &str = "Inferred growth year (lower bound)";
    pub const INFERRED_GROWTH_YEAR_UPPER: &str = "Inferred growth year (upper bound)";
    pub const ESTIMATED_FELLING_YEAR: &str = "Estimated felling year";
    pub const TREE_AGE_LOWER: &str = "Tree age (lower bound)";
    pub const TREE_AGE_UPPER: &str = "Tree age (upper bound)";
    pub const TREE_RINGS: &str = "Tree rings";
    pub const DISTANCE_TO_PITH: &str = "Distance to pith";
}
