/// Trims two sequences to their common trailing window.
///
/// Both outputs have length `min(a.len(), b.len())` and end at the newest
/// element of their input; the longer input loses its oldest elements. The
/// inputs are left untouched.
pub fn fit_series<A: Clone, B: Clone>(a: &[A], b: &[B]) -> (Vec<A>, Vec<B>) {
    let n = a.len().min(b.len());
    (a[a.len() - n..].to_vec(), b[b.len() - n..].to_vec())
}

/// Borrowing form of [`fit_series`] for internal hot paths.
#[inline]
pub(crate) fn fit_slices<'a, 'b, A, B>(a: &'a [A], b: &'b [B]) -> (&'a [A], &'b [B]) {
    let n = a.len().min(b.len());
    (&a[a.len() - n..], &b[b.len() - n..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_trailing_window() {
        let (a, b) = fit_series(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0]);
        assert_eq!(a, vec![3.0, 4.0]);
        assert_eq!(b, vec![10.0, 20.0]);

        let (a, b) = fit_series(&[true], &[1, 2, 3]);
        assert_eq!(a, vec![true]);
        assert_eq!(b, vec![3]);
    }

    #[test]
    fn empty_side_yields_empty_pair() {
        let (a, b) = fit_series::<f64, f64>(&[], &[1.0, 2.0]);
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn lengths_match_min_for_all_sizes() {
        let long: Vec<i32> = (0..7).collect();
        for k in 0..=7 {
            let short: Vec<i32> = (100..100 + k).collect();
            let (x, y) = fit_series(&long, &short);
            assert_eq!(x.len(), k as usize);
            assert_eq!(y.len(), k as usize);
            assert_eq!(x.as_slice(), &long[7 - k as usize..]);
            assert_eq!(y, short);
        }
    }
}
