use crate::data::{GroupedSeries, Series};

/// Index pairs `(i, j)` with `i < j` over `n` groups, in lexicographic order.
pub fn unordered_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect()
}

/// Every unordered pair of groups, in label order.
pub fn group_pairs(grouped: &GroupedSeries) -> Vec<((&str, &Series), (&str, &Series))> {
    let groups: Vec<(&str, &Series)> = grouped.iter().collect();
    unordered_pairs(groups.len())
        .into_iter()
        .map(|(i, j)| (groups[i], groups[j]))
        .collect()
}

/// Mean of a non-empty slice.
pub(crate) fn slice_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of a slice taken in ascending order, so the result does not depend on
/// the order the values arrived in.
pub(crate) fn order_invariant_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_cover_each_combination_once() {
        assert_eq!(unordered_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(unordered_pairs(1).is_empty());
        assert_eq!(unordered_pairs(5).len(), 10);
    }
}
