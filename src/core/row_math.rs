//! Pure row arithmetic: skip-pointer counts, cell offsets, skip-path
//! construction, coverage sets, and stitching. Nothing here touches
//! storage or hashing directly — these functions are the shared math that
//! both [`crate::ledger::skip_ledger`] and [`crate::ledger::path`] build on.

use std::collections::BTreeSet;

/// `1 + trailing_zeros(n)`, the number of skip pointers row `n` carries.
/// Defined for `n >= 1`.
pub fn skip_count(n: u64) -> u32 {
    debug_assert!(n >= 1, "skip_count is undefined for row 0");
    1 + n.trailing_zeros()
}

/// Starting cell offset of row `n` in the densely packed level-hash store.
///
/// Equal to `sum_{k=1}^{n-1} skip_count(k)`. Using Legendre's identity
/// `sum_{k=1}^{m} trailing_zeros(k) = m - popcount(m)`, this collapses to a
/// closed form computable in O(1) (well within the O(log n) budget).
pub fn cell_number(n: u64) -> u64 {
    debug_assert!(n >= 1);
    let m = n - 1;
    2 * m - m.count_ones() as u64
}

/// The largest row number `n` such that `cell_number(n + 1) <= cells`, i.e.
/// the number of complete rows representable in a level-hash store of the
/// given cell count. Returns 0 for an empty store.
pub fn max_rows(cells: u64) -> u64 {
    if cells == 0 {
        return 0;
    }
    let mut lo = 0u64;
    let mut hi = cells + 1;
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if cell_number(mid + 1) <= cells {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// `true` iff `b > a` and `b - a` is a power of two that is one of `b`'s
/// valid skip pointers (exponent `< skip_count(b)`).
pub fn rows_linked(a: u64, b: u64) -> bool {
    if b <= a {
        return false;
    }
    let d = b - a;
    if !d.is_power_of_two() {
        return false;
    }
    let k = d.trailing_zeros();
    k < skip_count(b)
}

/// The lexicographically unique shortest ascending sequence of row numbers
/// linking `lo` to `hi` via power-of-two decrements, each step bounded by
/// the current row's skip count. `lo` and `hi` are both included. Requires
/// `1 <= lo <= hi`.
pub fn skip_path_numbers(lo: u64, hi: u64) -> Vec<u64> {
    assert!(lo >= 1 && lo <= hi, "invalid range [{lo}, {hi}]");
    let mut rows = vec![hi];
    let mut current = hi;
    while current > lo {
        let p = skip_count(current);
        let mut chosen = None;
        for k in (0..p).rev() {
            let step = 1u64 << k;
            if current >= step && current - step >= lo {
                chosen = Some(step);
                break;
            }
        }
        let step = chosen.expect("lo is always reachable via step 2^0");
        current -= step;
        rows.push(current);
    }
    rows.reverse();
    rows
}

/// Expand an ordered, strictly ascending subset of row numbers into the
/// minimal closed path by inserting the [`skip_path_numbers`] between each
/// adjacent pair. Idempotent: `stitch(stitch(xs)) == stitch(xs)`.
pub fn stitch(row_nos: &[u64]) -> Vec<u64> {
    if row_nos.is_empty() {
        return Vec::new();
    }
    let mut out = vec![row_nos[0]];
    for pair in row_nos.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(b > a, "stitch requires strictly ascending row numbers");
        let seg = skip_path_numbers(a, b);
        // seg[0] == a, which is already the last element pushed.
        out.extend_from_slice(&seg[1..]);
    }
    out
}

/// The set of all row numbers appearing in `row_nos`, or referenced as a
/// skip pointer from any row in `row_nos` (after stitching).
pub fn coverage(row_nos: &[u64]) -> BTreeSet<u64> {
    let stitched = stitch(row_nos);
    let mut set = BTreeSet::new();
    for &n in &stitched {
        set.insert(n);
        let p = skip_count(n);
        for k in 0..p {
            let step = 1u64 << k;
            if n > step {
                set.insert(n - step);
            } else if n == step {
                // row 0 is abstract; not a member of coverage.
            }
        }
    }
    set
}

/// `coverage(row_nos) \ row_nos`: rows whose hash is known only because a
/// path member references it, not because the row itself is present.
pub fn ref_only_coverage(row_nos: &[u64]) -> BTreeSet<u64> {
    let stitched: BTreeSet<u64> = stitch(row_nos).into_iter().collect();
    coverage(row_nos)
        .into_iter()
        .filter(|n| !stitched.contains(n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_count_matches_definition() {
        assert_eq!(skip_count(1), 1); // trailing_zeros(1) = 0
        assert_eq!(skip_count(2), 2); // trailing_zeros(2) = 1
        assert_eq!(skip_count(3), 1);
        assert_eq!(skip_count(4), 3);
        assert_eq!(skip_count(8), 4);
        assert_eq!(skip_count(12), 3); // trailing_zeros(12)=2
    }

    #[test]
    fn cell_number_matches_naive_sum() {
        for n in 1..200u64 {
            let naive: u64 = (1..n).map(skip_count).map(u64::from).sum();
            assert_eq!(cell_number(n), naive, "mismatch at n={n}");
        }
    }

    #[test]
    fn cell_number_zero_at_row_one() {
        assert_eq!(cell_number(1), 0);
    }

    #[test]
    fn max_rows_round_trips_cell_number() {
        for n in 1..500u64 {
            let cells = cell_number(n + 1);
            assert_eq!(max_rows(cells), n, "max_rows({cells}) should be {n}");
        }
        assert_eq!(max_rows(0), 0);
    }

    #[test]
    fn rows_linked_basic_cases() {
        assert!(rows_linked(0, 1));
        assert!(rows_linked(0, 2));
        assert!(rows_linked(2, 4));
        assert!(rows_linked(0, 4));
        assert!(!rows_linked(1, 4)); // 3 is not a power of two
        assert!(!rows_linked(4, 2)); // descending
        assert!(rows_linked(3, 4)); // step 1, exponent 0 < skip_count(4)=3
    }

    #[test]
    fn rows_linked_step_one_always_valid() {
        // skip_count(n) >= 1 for all n >= 1, so the 2^0 pointer always exists.
        for n in 1..100u64 {
            assert!(rows_linked(n - 1, n));
        }
    }

    #[test]
    fn skip_path_numbers_is_ascending_and_endpoints_match() {
        for hi in 1..64u64 {
            for lo in 1..=hi {
                let path = skip_path_numbers(lo, hi);
                assert_eq!(*path.first().unwrap(), lo);
                assert_eq!(*path.last().unwrap(), hi);
                assert!(path.windows(2).all(|w| w[0] < w[1]));
                for w in path.windows(2) {
                    assert!(rows_linked(w[0], w[1]), "{:?} not linked", w);
                }
            }
        }
    }

    #[test]
    fn skip_path_is_shortest() {
        // A direct power-of-two gap should be length 2 (lo, hi).
        let path = skip_path_numbers(8, 16);
        assert_eq!(path, vec![8, 16]);
    }

    #[test]
    fn stitch_is_idempotent() {
        let xs = vec![1, 16, 52];
        let once = stitch(&xs);
        let twice = stitch(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn coverage_bound_holds() {
        let xs = vec![1u64, 8, 16, 32, 52];
        let cov = coverage(&xs);
        let max_n = *xs.iter().max().unwrap();
        let bound = xs.len() as f64 * (1.0 + (max_n as f64).log2().ceil());
        assert!((cov.len() as f64) <= bound, "{} > {}", cov.len(), bound);
    }

    #[test]
    fn ref_only_coverage_excludes_inputs() {
        let xs = stitch(&[1, 16]);
        let ref_only = ref_only_coverage(&xs);
        for n in &xs {
            assert!(!ref_only.contains(n));
        }
    }
}
