//! Membership deltas.
//!
//! A Delta represents a change to the membership of a collection, with a
//! diff value indicating whether the item joined (+1) or left (-1).

/// A differential change to a collection.
///
/// - `+1` means the item was inserted
/// - `-1` means the item was removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    /// The item being changed
    pub data: T,
    /// The differential: +1 for insert, -1 for delete
    pub diff: i32,
}

impl<T> Delta<T> {
    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(data: T) -> Self {
        Self { data, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(data: T) -> Self {
        Self { data, diff: -1 }
    }

    /// Returns true if this is an insertion.
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion.
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Maps the data to a new type, keeping the direction.
    #[inline]
    pub fn map<U, F>(self, f: F) -> Delta<U>
    where
        F: FnOnce(T) -> U,
    {
        Delta {
            data: f(self.data),
            diff: self.diff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_insert() {
        let d = Delta::insert(42);
        assert!(d.is_insert());
        assert!(!d.is_delete());
        assert_eq!(d.diff, 1);
    }

    #[test]
    fn test_delta_delete() {
        let d = Delta::delete("a");
        assert!(d.is_delete());
        assert_eq!(d.diff, -1);
    }

    #[test]
    fn test_delta_map_keeps_direction() {
        let d = Delta::delete(21).map(|x| x * 2);
        assert!(d.is_delete());
        assert_eq!(d.data, 42);
    }
}
