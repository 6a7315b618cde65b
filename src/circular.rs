use core::fmt;

/// Fixed-capacity column that overwrites its oldest value once full.
///
/// Values are kept in one contiguous allocation; when the ring has wrapped the
/// chronological order is `data[head..] ++ data[..head]`.
#[derive(Clone)]
pub struct CircularColumn<T: Copy + Default> {
    data: Vec<T>,
    head: usize, // next write slot
    len: usize,
}

impl<T: Copy + Default> fmt::Debug for CircularColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularColumn")
            .field("capacity", &self.data.len())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<T: Copy + Default> CircularColumn<T> {
    /// `capacity` must be non-zero; callers validate it up front.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            data: vec![T::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, v: T) {
        self.data[self.head] = v;
        self.head = (self.head + 1) % self.capacity();
        self.len = (self.len + 1).min(self.capacity());
    }

    /// Overwrites the most recent value. No-op on an empty column.
    #[inline]
    pub fn update_last(&mut self, v: T) {
        if let Some(slot) = self.slot_from_end(0) {
            self.data[slot] = v;
        }
    }

    /// Value `n` steps back from the newest (0 = newest).
    #[inline]
    pub fn get_from_end(&self, n: usize) -> Option<T> {
        self.slot_from_end(n).map(|slot| self.data[slot])
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Appends the stored values to `out`, oldest first.
    pub fn extend_ordered(&self, out: &mut Vec<T>) {
        let (older, newer) = self.ordered_slices();
        out.extend_from_slice(older);
        out.extend_from_slice(newer);
    }

    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        self.extend_ordered(&mut out);
        out
    }

    fn slot_from_end(&self, n: usize) -> Option<usize> {
        if n >= self.len {
            return None;
        }
        let cap = self.capacity();
        Some((self.head + cap - 1 - n) % cap)
    }

    fn ordered_slices(&self) -> (&[T], &[T]) {
        if self.len < self.capacity() {
            // Never wrapped: values sit in data[..head].
            (&self.data[self.head - self.len..self.head], &[])
        } else {
            (&self.data[self.head..], &self.data[..self.head])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CircularColumn;

    #[test]
    fn wraps_and_keeps_chronological_order() {
        let mut c = CircularColumn::<i64>::new(3);
        c.push(1);
        c.push(2);
        assert_eq!(c.to_vec(), vec![1, 2]);
        c.push(3);
        c.push(4);
        assert_eq!(c.to_vec(), vec![2, 3, 4]);
        assert_eq!(c.get_from_end(0), Some(4));
        assert_eq!(c.get_from_end(2), Some(2));
        assert_eq!(c.get_from_end(3), None);
    }

    #[test]
    fn update_last_after_wrap() {
        let mut c = CircularColumn::<f64>::new(2);
        c.update_last(9.0);
        assert!(c.is_empty());
        c.push(10.0);
        c.push(20.0);
        c.push(30.0);
        c.update_last(31.0);
        assert_eq!(c.to_vec(), vec![20.0, 31.0]);
        c.clear();
        assert_eq!(c.len(), 0);
        assert!(c.to_vec().is_empty());
    }
}
