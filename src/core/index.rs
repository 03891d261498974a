//! Index space types: ranges, ids and items.
//!
//! A [`Range`] describes the extent of an N-dimensional iteration space or
//! voxel grid. An [`Id`] is one coordinate inside it, and an [`Item`] pairs
//! an id with the range it was drawn from.
//!
//! Every layer of the runtime agrees on a single linearization rule:
//! row-major, with the **last** dimension varying fastest.
//!
//! ```text
//! linear = Σ_k id[k] * Π_{j>k} range[j]
//! ```
//!
//! For a `(10, 20)` range the id `(2, 5)` therefore maps to `2 * 20 + 5 = 45`.

use crate::core::error::ConfigurationError;
use std::fmt;
use std::ops::Index;

/// Extent of an N-dimensional index space.
///
/// Dimensions are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range<const N: usize> {
    dims: [usize; N],
}

impl<const N: usize> Range<N> {
    /// Create a range from one extent per dimension.
    pub const fn new(dims: [usize; N]) -> Self {
        Self { dims }
    }

    /// Extent of dimension `dim`.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= N`.
    #[inline]
    pub fn get(&self, dim: usize) -> usize {
        self.dims[dim]
    }

    /// All extents, outermost first.
    #[inline]
    pub fn dims(&self) -> [usize; N] {
        self.dims
    }

    /// Total number of coordinates (product of all extents).
    ///
    /// Saturates at `usize::MAX`. Buffers and dispatch use
    /// [`Range::checked_count`] and reject ranges that overflow.
    #[inline]
    pub fn count(&self) -> usize {
        self.checked_count().unwrap_or(usize::MAX)
    }

    /// Total number of coordinates, or `None` if it does not fit in `usize`.
    pub fn checked_count(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// [`Range::checked_count`] as a configuration result.
    pub fn try_count(&self, what: &'static str) -> Result<usize, ConfigurationError> {
        self.checked_count()
            .ok_or(ConfigurationError::ExtentOverflow { what })
    }

    /// Alias for [`Range::count`].
    #[inline]
    pub fn size(&self) -> usize {
        self.count()
    }

    /// Whether the range contains no coordinates at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether `id` lies inside this range on every axis.
    pub fn contains(&self, id: &Id<N>) -> bool {
        id.coords.iter().zip(self.dims.iter()).all(|(c, d)| c < d)
    }

    /// Flatten an id into its row-major offset.
    ///
    /// The result is only meaningful for ids inside the range.
    #[inline]
    pub fn linearize(&self, id: &Id<N>) -> usize {
        let mut linear = 0;
        let mut stride = 1;
        for k in (0..N).rev() {
            linear += id.coords[k] * stride;
            stride *= self.dims[k];
        }
        linear
    }

    /// Inverse of [`Range::linearize`] for offsets in `[0, count())`.
    #[inline]
    pub fn delinearize(&self, linear: usize) -> Id<N> {
        let mut coords = [0usize; N];
        let mut rest = linear;
        for k in (0..N).rev() {
            let extent = self.dims[k];
            if extent > 0 {
                coords[k] = rest % extent;
                rest /= extent;
            }
        }
        Id { coords }
    }
}

impl<const N: usize> Index<usize> for Range<N> {
    type Output = usize;

    fn index(&self, dim: usize) -> &usize {
        &self.dims[dim]
    }
}

impl<const N: usize> From<[usize; N]> for Range<N> {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims)
    }
}

impl From<usize> for Range<1> {
    fn from(d0: usize) -> Self {
        Self::new([d0])
    }
}

impl From<(usize, usize)> for Range<2> {
    fn from((d0, d1): (usize, usize)) -> Self {
        Self::new([d0, d1])
    }
}

impl From<(usize, usize, usize)> for Range<3> {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Self::new([d0, d1, d2])
    }
}

impl<const N: usize> fmt::Display for Range<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tuple(f, &self.dims)
    }
}

/// A coordinate inside a [`Range`].
///
/// Ids are produced by the dispatcher, one per work-item. Staying inside
/// `[0, range[k])` on every axis is a convention the dispatcher upholds; it
/// is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id<const N: usize> {
    coords: [usize; N],
}

impl<const N: usize> Default for Id<N> {
    fn default() -> Self {
        Self { coords: [0; N] }
    }
}

impl<const N: usize> Id<N> {
    /// Create an id from one coordinate per dimension.
    pub const fn new(coords: [usize; N]) -> Self {
        Self { coords }
    }

    /// Coordinate along dimension `dim`.
    #[inline]
    pub fn get(&self, dim: usize) -> usize {
        self.coords[dim]
    }

    /// All coordinates, outermost first.
    #[inline]
    pub fn coords(&self) -> [usize; N] {
        self.coords
    }
}

impl<const N: usize> Index<usize> for Id<N> {
    type Output = usize;

    fn index(&self, dim: usize) -> &usize {
        &self.coords[dim]
    }
}

impl<const N: usize> From<[usize; N]> for Id<N> {
    fn from(coords: [usize; N]) -> Self {
        Self::new(coords)
    }
}

impl From<usize> for Id<1> {
    fn from(c0: usize) -> Self {
        Self::new([c0])
    }
}

impl From<(usize, usize)> for Id<2> {
    fn from((c0, c1): (usize, usize)) -> Self {
        Self::new([c0, c1])
    }
}

impl From<(usize, usize, usize)> for Id<3> {
    fn from((c0, c1, c2): (usize, usize, usize)) -> Self {
        Self::new([c0, c1, c2])
    }
}

impl<const N: usize> From<Item<N>> for Id<N> {
    fn from(item: Item<N>) -> Self {
        item.id
    }
}

impl<const N: usize> fmt::Display for Id<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tuple(f, &self.coords)
    }
}

/// An [`Id`] together with the [`Range`] it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item<const N: usize> {
    range: Range<N>,
    id: Id<N>,
}

impl<const N: usize> Item<N> {
    /// Pair a coordinate with its range.
    pub fn new(range: impl Into<Range<N>>, id: impl Into<Id<N>>) -> Self {
        Self {
            range: range.into(),
            id: id.into(),
        }
    }

    /// The coordinate of this work-item.
    #[inline]
    pub fn get_id(&self) -> Id<N> {
        self.id
    }

    /// Coordinate along one dimension.
    #[inline]
    pub fn get(&self, dim: usize) -> usize {
        self.id.get(dim)
    }

    /// The range this item was drawn from.
    #[inline]
    pub fn get_range(&self) -> Range<N> {
        self.range
    }

    /// Row-major offset of this item within its range.
    #[inline]
    pub fn get_linear_id(&self) -> usize {
        self.range.linearize(&self.id)
    }
}

/// A value the dispatcher can hand to a kernel for one coordinate.
///
/// Implemented for [`Id`] and [`Item`], so a kernel may take either.
pub trait WorkItem<const N: usize>: Copy + Send {
    /// Build the work-item for flat offset `linear` of `range`.
    fn from_linear(range: &Range<N>, linear: usize) -> Self;
}

impl<const N: usize> WorkItem<N> for Id<N> {
    #[inline]
    fn from_linear(range: &Range<N>, linear: usize) -> Self {
        range.delinearize(linear)
    }
}

impl<const N: usize> WorkItem<N> for Item<N> {
    #[inline]
    fn from_linear(range: &Range<N>, linear: usize) -> Self {
        Item {
            range: *range,
            id: range.delinearize(linear),
        }
    }
}

fn write_tuple(f: &mut fmt::Formatter<'_>, values: &[usize]) -> fmt::Result {
    write!(f, "(")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_count() {
        assert_eq!(Range::new([10, 20]).count(), 200);
        assert_eq!(Range::<3>::from((4usize, 8usize, 2usize)).count(), 64);
        assert_eq!(Range::<1>::from(7usize).count(), 7);
        assert!(Range::new([3, 0]).is_empty());
    }

    #[test]
    fn test_count_overflow() {
        let huge = Range::new([usize::MAX, 2]);
        assert_eq!(huge.checked_count(), None);
        assert_eq!(huge.count(), usize::MAX);
        assert!(!huge.is_empty());
        assert_eq!(
            huge.try_count("buffer"),
            Err(ConfigurationError::ExtentOverflow { what: "buffer" })
        );
        assert_eq!(Range::new([usize::MAX, usize::MAX, 0]).checked_count(), Some(0));
        assert_eq!(Range::new([6, 7]).try_count("buffer"), Ok(42));
    }

    #[test]
    fn test_linear_id_2d() {
        let item = Item::new(Range::new([10, 20]), Id::new([2, 5]));
        assert_eq!(item.get_linear_id(), 45);
        assert_eq!(item.get_id(), Id::new([2, 5]));
        assert_eq!(item.get_range()[1], 20);
    }

    #[test]
    fn test_linear_id_3d_last_axis_fastest() {
        let range = Range::new([2, 3, 4]);
        assert_eq!(range.linearize(&Id::new([0, 0, 1])), 1);
        assert_eq!(range.linearize(&Id::new([0, 1, 0])), 4);
        assert_eq!(range.linearize(&Id::new([1, 0, 0])), 12);
        assert_eq!(range.linearize(&Id::new([1, 2, 3])), 23);
    }

    #[test]
    fn test_delinearize() {
        let range = Range::new([4, 8]);
        assert_eq!(range.delinearize(21), Id::new([2, 5]));
        assert_eq!(range.delinearize(31), Id::new([3, 7]));
    }

    #[test]
    fn test_contains() {
        let range = Range::new([4, 8]);
        assert!(range.contains(&Id::new([3, 7])));
        assert!(!range.contains(&Id::new([4, 0])));
    }

    #[test]
    fn test_work_item_from_linear() {
        let range = Range::new([10, 20]);
        let id = <Id<2> as WorkItem<2>>::from_linear(&range, 45);
        let item = <Item<2> as WorkItem<2>>::from_linear(&range, 45);
        assert_eq!(id, item.get_id());
        assert_eq!(item.get_linear_id(), 45);
    }

    #[test]
    fn test_display() {
        assert_eq!(Range::new([4, 8]).to_string(), "(4, 8)");
        assert_eq!(Id::new([1, 2, 3]).to_string(), "(1, 2, 3)");
    }

    proptest! {
        #[test]
        fn prop_linearization_is_bijective(d0 in 1usize..6, d1 in 1usize..6, d2 in 1usize..6) {
            let range = Range::new([d0, d1, d2]);
            let mut seen = vec![false; range.count()];
            for linear in 0..range.count() {
                let id = range.delinearize(linear);
                prop_assert!(range.contains(&id));
                let back = range.linearize(&id);
                prop_assert_eq!(back, linear);
                prop_assert!(!seen[back]);
                seen[back] = true;
            }
            prop_assert!(seen.into_iter().all(|s| s));
        }
    }
}
