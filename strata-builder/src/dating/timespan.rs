//! Sample-in-timespan predicate

/// True iff a sample spanning `[germination, felling]` overlaps the query
/// window `[start, end)`. Collapses the four overlap cases (left, inner,
/// outer, right) to a single inequality.
pub fn overlaps(germination: i32, felling: i32, start: i32, end: i32) -> bool {
    !(felling < start || germination > end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_overlap_included() {
        assert!(overlaps(900, 950, 925, 940));
    }

    #[test]
    fn test_disjoint_excluded() {
        assert!(!overlaps(100, 200, 300, 400));
        assert!(!overlaps(500, 600, 300, 400));
    }

    #[test]
    fn test_left_and_right_edges() {
        // Sample ends exactly at window start: still counted as overlap
        assert!(overlaps(100, 300, 300, 400));
        // Sample starts exactly at window end: still counted per predicate
        assert!(overlaps(400, 500, 300, 400));
        // One year beyond either edge: excluded
        assert!(!overlaps(100, 299, 300, 400));
        assert!(!overlaps(401, 500, 300, 400));
    }

    #[test]
    fn test_outer_overlap_included() {
        assert!(overlaps(100, 900, 300, 400));
    }
}
