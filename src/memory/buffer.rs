//! Host-backed buffers with deferred writeback.
//!
//! A [`Buffer`] owns private storage of `range.count()` elements. When built
//! over a host slice, it copies the slice in once, and copies its storage
//! back out exactly once when it is dropped. Kernels only ever touch the
//! private storage through [`Accessor`]s, so no partial result is visible
//! in host memory while the buffer is alive.
//!
//! The buffer borrows the host slice mutably and accessors borrow the
//! buffer, so the borrow checker already guarantees that every command
//! group using a buffer has finished before the buffer can be dropped.

use crate::core::error::ConfigurationError;
use crate::core::index::Range;
use crate::execution::handler::Handler;
use crate::memory::accessor::{AccessMode, Accessor};
use std::cell::UnsafeCell;
use std::fmt;

/// Private element storage shared by a buffer's accessors.
pub(crate) struct DeviceStorage<T> {
    cells: Box<[UnsafeCell<T>]>,
}

// Work-items write disjoint cells concurrently through shared references.
// Keeping distinct work-items on distinct coordinates is the kernel's
// responsibility.
unsafe impl<T: Send + Sync> Sync for DeviceStorage<T> {}

impl<T> DeviceStorage<T> {
    fn from_vec(data: Vec<T>) -> Self {
        Self {
            cells: data.into_iter().map(UnsafeCell::new).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Raw pointer to element `index`. Panics when out of bounds.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> *mut T {
        self.cells[index].get()
    }

    fn as_slice(&mut self) -> &[T] {
        // SAFETY: `UnsafeCell<T>` has the same layout as `T`, and the
        // exclusive borrow rules out concurrent writers.
        unsafe { std::slice::from_raw_parts(self.cells.as_ptr() as *const T, self.cells.len()) }
    }

    fn into_vec(self) -> Vec<T> {
        self.cells
            .into_vec()
            .into_iter()
            .map(UnsafeCell::into_inner)
            .collect()
    }
}

impl<T> Default for DeviceStorage<T> {
    fn default() -> Self {
        Self {
            cells: Box::default(),
        }
    }
}

/// Scoped storage for kernel inputs and outputs.
pub struct Buffer<'h, T, const N: usize> {
    storage: DeviceStorage<T>,
    range: Range<N>,
    host: Option<&'h mut [T]>,
}

impl<'h, T, const N: usize> Buffer<'h, T, N> {
    /// Create a buffer with default-initialised storage and no host copy.
    pub fn new(range: impl Into<Range<N>>) -> Result<Self, ConfigurationError>
    where
        T: Default,
    {
        let range = range.into();
        let count = range.try_count("buffer")?;
        let data = std::iter::repeat_with(T::default).take(count).collect();
        Ok(Self {
            storage: DeviceStorage::from_vec(data),
            range,
            host: None,
        })
    }

    /// Create a buffer that takes ownership of initial contents.
    pub fn from_vec(data: Vec<T>, range: impl Into<Range<N>>) -> Result<Self, ConfigurationError> {
        let range = range.into();
        check_size(range, data.len())?;
        Ok(Self {
            storage: DeviceStorage::from_vec(data),
            range,
            host: None,
        })
    }

    /// Create a buffer over host memory.
    ///
    /// The host contents are copied in now and the buffer's contents are
    /// written back when it is dropped.
    pub fn from_host(host: &'h mut [T], range: impl Into<Range<N>>) -> Result<Self, ConfigurationError>
    where
        T: Clone,
    {
        let range = range.into();
        check_size(range, host.len())?;
        log::debug!("buffer {}: copying {} elements in from host", range, host.len());
        Ok(Self {
            storage: DeviceStorage::from_vec(host.to_vec()),
            range,
            host: Some(host),
        })
    }

    /// Create a buffer over host memory for write-only use.
    ///
    /// Skips the initial copy; storage starts default-initialised. The
    /// contents are still written back when the buffer is dropped.
    pub fn from_host_discard(host: &'h mut [T], range: impl Into<Range<N>>) -> Result<Self, ConfigurationError>
    where
        T: Default,
    {
        let range = range.into();
        let count = check_size(range, host.len())?;
        let data = std::iter::repeat_with(T::default).take(count).collect();
        Ok(Self {
            storage: DeviceStorage::from_vec(data),
            range,
            host: Some(host),
        })
    }

    /// The buffer's extent.
    pub fn range(&self) -> Range<N> {
        self.range
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Whether the buffer writes back to host memory when dropped.
    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    /// Bind an accessor with the given mode to a command group.
    pub fn get_access<'a>(&'a self, handler: &'a Handler<'_>, mode: AccessMode) -> Accessor<'a, T, N> {
        Accessor::with_mode(self, handler, mode)
    }

    /// Current contents, as seen from the host.
    ///
    /// Takes `&mut self`, so no command group can be using the buffer.
    pub fn host_view(&mut self) -> &[T] {
        self.storage.as_slice()
    }

    /// Finish with the buffer early and return its contents.
    ///
    /// Performs the host writeback first when the buffer wraps host memory.
    pub fn into_vec(mut self) -> Vec<T>
    where
        T: Clone,
    {
        let data = std::mem::take(&mut self.storage).into_vec();
        if let Some(host) = self.host.take() {
            log::debug!("buffer {}: writing {} elements back to host", self.range, data.len());
            host.clone_from_slice(&data);
        }
        data
    }

    pub(crate) fn storage(&self) -> &DeviceStorage<T> {
        &self.storage
    }
}

impl<T, const N: usize> Drop for Buffer<'_, T, N> {
    fn drop(&mut self) {
        let Some(host) = self.host.take() else {
            return;
        };
        let data = std::mem::take(&mut self.storage).into_vec();
        log::debug!("buffer {}: writing {} elements back to host", self.range, data.len());
        for (dst, src) in host.iter_mut().zip(data) {
            *dst = src;
        }
    }
}

impl<T, const N: usize> fmt::Debug for Buffer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("range", &self.range)
            .field("len", &self.storage.len())
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

fn check_size<const N: usize>(range: Range<N>, got: usize) -> Result<usize, ConfigurationError> {
    let expected = range.try_count("buffer")?;
    if expected != got {
        return Err(ConfigurationError::SizeMismatch { expected, got });
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::Id;
    use crate::execution::queue::Queue;
    use crate::execution::pool::InlinePool;

    fn inline_queue() -> Queue {
        Queue::with_pool(InlinePool.shared())
    }

    #[test]
    fn test_size_mismatch() {
        let mut host = vec![0u8; 10];
        let err = Buffer::from_host(&mut host, Range::new([3, 4])).unwrap_err();
        assert_eq!(err, ConfigurationError::SizeMismatch { expected: 12, got: 10 });
    }

    #[test]
    fn test_host_untouched_until_drop() {
        let mut host: Vec<i32> = (0..64).collect();
        {
            let buffer = Buffer::from_host(&mut host, Range::new([64])).unwrap();
            inline_queue()
                .submit(|h| {
                    let acc = Accessor::new(&buffer, h);
                    h.parallel_for(Range::new([64]), move |id: Id<1>| acc.update(id, |v| *v *= 2));
                })
                .unwrap();

            let host_now = buffer.host.as_deref().unwrap();
            assert_eq!(host_now[1], 1);
            assert_eq!(host_now[63], 63);
        }
        assert_eq!(host[0], 0);
        assert_eq!(host[1], 2);
        assert_eq!(host[63], 126);
    }

    #[test]
    fn test_writeback_on_panic_unwind() {
        let mut host = vec![1u32; 8];
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let buffer = Buffer::from_host(&mut host, Range::new([8])).unwrap();
            inline_queue()
                .submit(|h| {
                    let acc = Accessor::new(&buffer, h);
                    h.parallel_for(Range::new([8]), move |id: Id<1>| acc.set(id, 9));
                })
                .unwrap();
            panic!("host code failed after the kernel ran");
        }));
        assert!(result.is_err());
        assert_eq!(host, vec![9u32; 8]);
    }

    #[test]
    fn test_discard_skips_copy_in() {
        let mut host = vec![5u16; 6];
        {
            let mut buffer = Buffer::from_host_discard(&mut host, Range::new([2, 3])).unwrap();
            assert_eq!(buffer.host_view(), &[0u16; 6]);
        }
        assert_eq!(host, vec![0u16; 6]);
    }

    #[test]
    fn test_owned_buffer() {
        let mut buffer: Buffer<'_, f64, 2> = Buffer::new(Range::new([2, 2])).unwrap();
        assert!(!buffer.has_host());
        assert_eq!(buffer.len(), 4);

        inline_queue()
            .submit(|h| {
                let acc = buffer.get_access(h, AccessMode::DiscardWrite);
                h.parallel_for(Range::new([2, 2]), move |id: Id<2>| {
                    acc.set(id, (id[0] * 2 + id[1]) as f64 * 0.5)
                });
            })
            .unwrap();

        assert_eq!(buffer.host_view(), &[0.0, 0.5, 1.0, 1.5]);
        assert_eq!(buffer.into_vec(), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_into_vec_writes_back() {
        let mut host = vec![3i64; 4];
        let buffer = Buffer::from_host(&mut host, Range::new([4])).unwrap();
        inline_queue()
            .submit(|h| {
                let acc = Accessor::new(&buffer, h);
                h.parallel_for(Range::new([4]), move |id: Id<1>| acc.update(id, |v| *v += id[0] as i64));
            })
            .unwrap();
        let data = buffer.into_vec();
        assert_eq!(data, vec![3, 4, 5, 6]);
        assert_eq!(host, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_from_vec() {
        let mut buffer = Buffer::from_vec(vec![1u8, 2, 3], Range::new([3])).unwrap();
        assert_eq!(buffer.host_view(), &[1, 2, 3]);
        assert!(Buffer::<u8, 1>::from_vec(vec![1u8], Range::new([3])).is_err());
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        let overflow = ConfigurationError::ExtentOverflow { what: "buffer" };
        assert_eq!(
            Buffer::<u8, 2>::new(Range::new([usize::MAX, 2])).unwrap_err(),
            overflow
        );
        let mut host = vec![0u8; 4];
        assert_eq!(
            Buffer::from_host(&mut host, Range::new([usize::MAX, 3])).unwrap_err(),
            overflow
        );
    }
}
