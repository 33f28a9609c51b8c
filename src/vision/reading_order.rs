//! Reading-order reconstruction for detected text regions
//!
//! Engines report regions in no particular order. Regions are arranged
//! top-to-bottom, then left-to-right, treating regions whose top edges lie
//! within a tolerance band as one row.
//!
//! A pairwise "same line if within tolerance" comparator is not transitive
//! once three or more regions straddle the band, so rows are formed first:
//! regions are sorted by descending top edge and each row is anchored at its
//! highest region. A region joins the current row while its top edge is
//! within the tolerance of the anchor; otherwise it starts a new row. Rows
//! keep their vertical order and each row is then sorted by left edge.

use std::cmp::Ordering;

use super::region::TextRegion;

/// Absorbs floating point noise at the exact tolerance boundary
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Order regions into reading order using `tolerance` as the same-line band
pub fn order_regions(regions: Vec<TextRegion>, tolerance: f64) -> Vec<TextRegion> {
    let mut indexed: Vec<(usize, TextRegion)> = regions.into_iter().enumerate().collect();
    let rows = assign_rows(&mut indexed, tolerance);

    let mut keyed: Vec<(usize, (usize, TextRegion))> = rows.into_iter().zip(indexed).collect();
    keyed.sort_by(|(row_a, (idx_a, a)), (row_b, (idx_b, b))| {
        row_a
            .cmp(row_b)
            .then_with(|| a.bounds().left().total_cmp(&b.bounds().left()))
            .then_with(|| b.bounds().top().total_cmp(&a.bounds().top()))
            .then_with(|| idx_a.cmp(idx_b))
    });

    keyed.into_iter().map(|(_, (_, region))| region).collect()
}

/// Sort by descending top edge and return the row index of each region
fn assign_rows(regions: &mut [(usize, TextRegion)], tolerance: f64) -> Vec<usize> {
    regions.sort_by(|(idx_a, a), (idx_b, b)| by_top_then_left(a, b).then_with(|| idx_a.cmp(idx_b)));

    let mut rows = Vec::with_capacity(regions.len());
    let mut row = 0usize;
    let mut anchor: Option<f64> = None;

    for (_, region) in regions.iter() {
        let top = region.bounds().top();
        match anchor {
            Some(anchor_top) if anchor_top - top <= tolerance + BOUNDARY_EPSILON => {}
            Some(_) => {
                row += 1;
                anchor = Some(top);
            }
            None => anchor = Some(top),
        }
        rows.push(row);
    }

    rows
}

fn by_top_then_left(a: &TextRegion, b: &TextRegion) -> Ordering {
    b.bounds()
        .top()
        .total_cmp(&a.bounds().top())
        .then_with(|| a.bounds().left().total_cmp(&b.bounds().left()))
}
