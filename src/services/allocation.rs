//! Box allocation arithmetic.
//!
//! Everything here is pure. Both the discrepancy re-split and the
//! recommendation-driven auto-allocation go through [`split`] so they share a
//! single rounding rule.

use serde::Serialize;

use crate::models::{BoxCounts, Warehouse, WarehouseBoxes, MAX_BOXES_PER_BUCKET};

/// How a total is distributed over the warehouse buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Weighting {
    /// In proportion to the given per-bucket weights.
    Proportional(WarehouseBoxes),
    /// Greedily, in the given order, never exceeding each bucket's capacity.
    Fill(Vec<(Warehouse, u32)>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Split {
    pub boxes: WarehouseBoxes,
    /// Part of the total no bucket could take
    pub unallocated: u32,
}

/// Distributes `total` boxes according to `weighting`.
///
/// Proportional splits round each bucket's cumulative share half-up, so the
/// buckets always add up to `total` exactly; with all-zero weights nothing is
/// placed and the whole total is reported as unallocated.
pub fn split(total: u32, weighting: &Weighting) -> Split {
    match weighting {
        Weighting::Proportional(weights) => proportional(total, weights),
        Weighting::Fill(order) => fill(total, order),
    }
}

fn proportional(total: u32, weights: &WarehouseBoxes) -> Split {
    let weight_sum = u128::from(weights.total());
    if weight_sum == 0 {
        return Split {
            boxes: WarehouseBoxes::default(),
            unallocated: total,
        };
    }

    let total = u128::from(total);
    let mut boxes = WarehouseBoxes::default();
    let mut cumulative_weight = 0u128;
    let mut placed = 0u128;

    for warehouse in Warehouse::ALL {
        cumulative_weight += u128::from(weights.get(warehouse));
        // round(total * cumulative / sum), half-up, in integers
        let until_here = (2 * total * cumulative_weight + weight_sum) / (2 * weight_sum);
        // until_here <= total, which came from a u32
        boxes.set(warehouse, (until_here - placed) as u32);
        placed = until_here;
    }

    Split {
        boxes,
        unallocated: 0,
    }
}

fn fill(total: u32, order: &[(Warehouse, u32)]) -> Split {
    let mut boxes = WarehouseBoxes::default();
    let mut remaining = total;

    for (warehouse, capacity) in order {
        let take = remaining.min(*capacity);
        boxes.set(*warehouse, boxes.get(*warehouse) + take);
        remaining -= take;
    }

    Split {
        boxes,
        unallocated: remaining,
    }
}

/// Suggested boxes placed on `primary` first and the rest on `secondary`,
/// each capped by its available stock. Any shortfall is left unallocated.
pub fn auto_allocate(
    suggested: u32,
    primary: (Warehouse, u32),
    secondary: (Warehouse, u32),
) -> Split {
    split(suggested, &Weighting::Fill(vec![primary, secondary]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Physically counted pairs rounded up to whole boxes
    pub fisik_boxes: u32,
    pub boxes: WarehouseBoxes,
}

/// Re-proportions an arrived line to its physically counted pairs.
///
/// A line that originally had no boxes stays empty whatever was counted.
pub fn reconcile(original: &WarehouseBoxes, fisik: u32, pairs_per_box: u32) -> Reconciliation {
    let fisik_boxes = fisik.div_ceil(pairs_per_box.max(1));
    let split = split(fisik_boxes, &Weighting::Proportional(*original));

    Reconciliation {
        fisik_boxes,
        boxes: split.boxes,
    }
}

/// Turns caller-supplied box counts into an allocation, reporting every bucket
/// that is negative or implausibly large. The line total is always the sum.
pub fn baseline(article_code: &str, counts: &BoxCounts) -> Result<WarehouseBoxes, Vec<String>> {
    let mut boxes = WarehouseBoxes::default();
    let mut violations = Vec::new();

    for warehouse in Warehouse::ALL {
        let requested = counts.get(warehouse);
        if requested < 0 {
            violations.push(format!(
                "{}: {} boxes must not be negative, got {}",
                article_code, warehouse, requested
            ));
        } else if requested > i64::from(MAX_BOXES_PER_BUCKET) {
            violations.push(format!(
                "{}: {} boxes must not exceed {}, got {}",
                article_code, warehouse, MAX_BOXES_PER_BUCKET, requested
            ));
        } else {
            boxes.set(warehouse, requested as u32);
        }
    }

    if violations.is_empty() {
        Ok(boxes)
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ddd_ljbb(ddd: u32, ljbb: u32) -> WarehouseBoxes {
        WarehouseBoxes::default()
            .with(Warehouse::Ddd, ddd)
            .with(Warehouse::Ljbb, ljbb)
    }

    #[test]
    fn arrived_line_with_missing_pairs_is_resplit() {
        // 6 + 2 boxes of 12 pairs shipped, 84 pairs counted
        let result = reconcile(&ddd_ljbb(6, 2), 84, 12);
        assert_eq!(result.fisik_boxes, 7);
        assert_eq!(result.boxes, ddd_ljbb(5, 2));
    }

    #[rstest]
    #[case(ddd_ljbb(1, 1), 1, ddd_ljbb(1, 0))]
    #[case(ddd_ljbb(1, 1), 3, ddd_ljbb(2, 1))]
    #[case(ddd_ljbb(1, 3), 2, ddd_ljbb(1, 1))]
    #[case(ddd_ljbb(0, 5), 4, ddd_ljbb(0, 4))]
    #[case(ddd_ljbb(3, 0), 9, ddd_ljbb(9, 0))]
    fn two_bucket_split_rounds_the_first_share_half_up(
        #[case] weights: WarehouseBoxes,
        #[case] total: u32,
        #[case] expected: WarehouseBoxes,
    ) {
        let result = split(total, &Weighting::Proportional(weights));
        assert_eq!(result.boxes, expected);
        assert_eq!(result.unallocated, 0);
    }

    #[test]
    fn four_bucket_split_conserves_the_total() {
        let weights = WarehouseBoxes {
            ddd: 1,
            ljbb: 1,
            mbb: 1,
            ubb: 0,
        };
        let result = split(10, &Weighting::Proportional(weights));
        assert_eq!(result.boxes.total(), 10);
        assert_eq!(result.boxes.ubb, 0);
    }

    #[test]
    fn empty_original_line_stays_empty() {
        let result = reconcile(&WarehouseBoxes::default(), 48, 12);
        assert_eq!(result.fisik_boxes, 4);
        assert!(result.boxes.is_empty());
    }

    #[test]
    fn partial_box_counts_as_a_whole_box() {
        assert_eq!(reconcile(&ddd_ljbb(1, 0), 13, 12).fisik_boxes, 2);
        assert_eq!(reconcile(&ddd_ljbb(1, 0), 0, 12).fisik_boxes, 0);
    }

    #[test]
    fn auto_allocation_fills_primary_then_secondary() {
        let result = auto_allocate(10, (Warehouse::Ddd, 6), (Warehouse::Ljbb, 10));
        assert_eq!(result.boxes, ddd_ljbb(6, 4));
        assert_eq!(result.unallocated, 0);
    }

    #[test]
    fn auto_allocation_under_fills_silently() {
        let result = auto_allocate(10, (Warehouse::Mbb, 3), (Warehouse::Ubb, 2));
        assert_eq!(result.boxes.mbb, 3);
        assert_eq!(result.boxes.ubb, 2);
        assert_eq!(result.unallocated, 5);
    }

    #[test]
    fn auto_allocation_prefers_primary_when_it_suffices() {
        let result = auto_allocate(4, (Warehouse::Ljbb, 9), (Warehouse::Ddd, 9));
        assert_eq!(result.boxes, ddd_ljbb(0, 4));
    }

    #[test]
    fn baseline_total_is_the_bucket_sum() {
        let counts = BoxCounts {
            ddd: 2,
            ljbb: 0,
            mbb: 3,
            ubb: 1,
        };
        assert_eq!(baseline("A1", &counts).unwrap().total(), 6);
    }

    #[test]
    fn baseline_reports_every_bad_bucket() {
        let counts = BoxCounts {
            ddd: -1,
            ljbb: 0,
            mbb: i64::from(MAX_BOXES_PER_BUCKET) + 1,
            ubb: -3,
        };
        let violations = baseline("A1", &counts).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0], "A1: DDD boxes must not be negative, got -1");
    }
}
