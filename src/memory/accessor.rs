//! Accessors: per-command-group views into a buffer.
//!
//! An [`Accessor`] borrows both its [`Buffer`] and the [`Handler`] of the
//! command group that created it, so it cannot outlive either. It is `Copy`
//! and `Sync` (for `Send + Sync` elements) and is meant to be captured by
//! value in kernel closures.
//!
//! Indexing uses the same row-major rule as [`Range::linearize`]. Distinct
//! work-items must read and write distinct coordinates; that discipline is
//! up to the kernel and is not checked.

use crate::core::index::{Id, Range};
use crate::execution::handler::Handler;
use crate::memory::buffer::{Buffer, DeviceStorage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared intent of an accessor.
///
/// Modes are advisory. Indexing behaves identically for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessMode {
    /// Kernel only reads.
    Read,
    /// Kernel only writes.
    Write,
    /// Kernel reads and writes.
    #[default]
    ReadWrite,
    /// Kernel writes and ignores prior contents.
    DiscardWrite,
    /// Kernel reads and writes and ignores prior contents.
    DiscardReadWrite,
}

impl AccessMode {
    /// Whether this mode declares reads.
    pub fn reads(self) -> bool {
        matches!(
            self,
            AccessMode::Read | AccessMode::ReadWrite | AccessMode::DiscardReadWrite
        )
    }

    /// Whether this mode declares writes.
    pub fn writes(self) -> bool {
        !matches!(self, AccessMode::Read)
    }

    /// Whether prior contents may be discarded.
    pub fn discards(self) -> bool {
        matches!(self, AccessMode::DiscardWrite | AccessMode::DiscardReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::ReadWrite => "read_write",
            AccessMode::DiscardWrite => "discard_write",
            AccessMode::DiscardReadWrite => "discard_read_write",
        };
        f.write_str(name)
    }
}

/// Indexed view into a buffer's private storage.
pub struct Accessor<'a, T, const N: usize> {
    storage: &'a DeviceStorage<T>,
    range: Range<N>,
    mode: AccessMode,
}

impl<'a, T, const N: usize> Accessor<'a, T, N> {
    /// Bind a read-write accessor to `buffer` for the command group `handler`.
    pub fn new(buffer: &'a Buffer<'_, T, N>, handler: &'a Handler<'_>) -> Self {
        Self::with_mode(buffer, handler, AccessMode::ReadWrite)
    }

    /// Bind an accessor with an explicit mode.
    pub fn with_mode(buffer: &'a Buffer<'_, T, N>, handler: &'a Handler<'_>, mode: AccessMode) -> Self {
        handler.register_accessor();
        log::trace!(
            "accessor #{} ({}) bound to buffer {}",
            handler.accessor_count(),
            mode,
            buffer.range()
        );
        Self {
            storage: buffer.storage(),
            range: buffer.range(),
            mode,
        }
    }

    /// Extent of the underlying buffer.
    pub fn range(&self) -> Range<N> {
        self.range
    }

    /// The declared access mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Number of elements visible through this accessor.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the accessor views no elements.
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Read the element at `id`.
    ///
    /// Any number of calls on one coordinate from the same work-item are
    /// fine. Two work-items of one dispatch touching the same coordinate,
    /// where at least one writes, is a data race the kernel must avoid.
    ///
    /// # Panics
    ///
    /// Panics if `id` linearizes past the end of the buffer.
    #[inline]
    pub fn get(&self, id: impl Into<Id<N>>) -> T
    where
        T: Clone,
    {
        self.get_linear(self.range.linearize(&id.into()))
    }

    /// Overwrite the element at `id`.
    ///
    /// Same cross-work-item rule as [`Accessor::get`].
    #[inline]
    pub fn set(&self, id: impl Into<Id<N>>, value: T) {
        self.set_linear(self.range.linearize(&id.into()), value)
    }

    /// Read-modify-write the element at `id`.
    ///
    /// `f` works on a copy; the result is stored when it returns, so
    /// accesses `f` itself makes to the same coordinate are overwritten.
    #[inline]
    pub fn update<F>(&self, id: impl Into<Id<N>>, f: F)
    where
        T: Clone,
        F: FnOnce(&mut T),
    {
        let linear = self.range.linearize(&id.into());
        let mut value = self.get_linear(linear);
        f(&mut value);
        self.set_linear(linear, value);
    }

    /// Read the element at a flat offset.
    #[inline]
    pub fn get_linear(&self, linear: usize) -> T
    where
        T: Clone,
    {
        let ptr = self.storage.slot(linear);
        // SAFETY: in bounds, no other work-item writes this coordinate, and
        // no reference into the storage outlives a single accessor call.
        unsafe { (*ptr).clone() }
    }

    /// Overwrite the element at a flat offset.
    #[inline]
    pub fn set_linear(&self, linear: usize, value: T) {
        let ptr = self.storage.slot(linear);
        // SAFETY: in bounds; this work-item owns the coordinate.
        unsafe { *ptr = value }
    }
}

impl<T, const N: usize> Clone for Accessor<'_, T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize> Copy for Accessor<'_, T, N> {}

impl<T, const N: usize> fmt::Debug for Accessor<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("range", &self.range)
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DispatchConfig;
    use crate::core::index::Item;
    use crate::execution::pool::WorkerPool;
    use crate::execution::queue::Queue;

    fn queue() -> Queue {
        Queue::from_config(DispatchConfig::new().with_worker_threads(4).with_min_chunk_size(4)).unwrap()
    }

    #[test]
    fn test_access_mode_flags() {
        assert!(AccessMode::Read.reads());
        assert!(!AccessMode::Read.writes());
        assert!(AccessMode::DiscardWrite.discards());
        assert!(!AccessMode::DiscardWrite.reads());
        assert_eq!(AccessMode::default(), AccessMode::ReadWrite);
        assert_eq!(AccessMode::DiscardReadWrite.to_string(), "discard_read_write");
    }

    #[test]
    fn test_2d_addressing() {
        let mut matrix = vec![0usize; 4 * 8];
        {
            let buffer = Buffer::from_host(&mut matrix, Range::new([4, 8])).unwrap();
            queue()
                .submit(|h| {
                    let acc = Accessor::with_mode(&buffer, h, AccessMode::Write);
                    h.parallel_for(Range::new([4, 8]), move |id: Id<2>| acc.set(id, id[0] * 10 + id[1]));
                })
                .unwrap();
        }
        assert_eq!(matrix[2 * 8 + 5], 25);
        assert_eq!(matrix[3 * 8 + 7], 37);
    }

    #[test]
    fn test_read_one_buffer_write_another() {
        let src: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let mut dst = vec![0.0f32; 100];
        {
            let src_buf = Buffer::from_vec(src, Range::new([10, 10])).unwrap();
            let dst_buf = Buffer::from_host_discard(&mut dst, Range::new([10, 10])).unwrap();
            queue()
                .submit(|h| {
                    let input = src_buf.get_access(h, AccessMode::Read);
                    let output = dst_buf.get_access(h, AccessMode::DiscardWrite);
                    assert_eq!(h.accessor_count(), 2);
                    h.parallel_for(Range::new([10, 10]), move |item: Item<2>| {
                        let transposed = Id::new([item.get(1), item.get(0)]);
                        output.set(item.get_id(), input.get(transposed));
                    });
                })
                .unwrap();
        }
        assert_eq!(dst[1], 10.0);
        assert_eq!(dst[3 * 10 + 7], 73.0);
    }

    #[test]
    fn test_update_with_nested_access() {
        let mut host = vec![1i32; 4];
        {
            let buffer = Buffer::from_host(&mut host, Range::new([4])).unwrap();
            Queue::with_pool(crate::execution::pool::InlinePool.shared())
                .submit(|h| {
                    let acc = Accessor::new(&buffer, h);
                    h.parallel_for(Range::new([4]), move |id: Id<1>| {
                        acc.update(id, |v| {
                            acc.set(id, 100);
                            assert_eq!(acc.get(id), 100);
                            *v += 1;
                        })
                    });
                })
                .unwrap();
        }
        assert_eq!(host, vec![2; 4]);
    }

    #[test]
    fn test_out_of_bounds_is_a_kernel_error() {
        let buffer: Buffer<'_, u8, 1> = Buffer::new(Range::new([4])).unwrap();
        let queue = Queue::with_pool(WorkerPool::new(1).unwrap().shared());
        let result = queue.submit(|h| {
            let acc = Accessor::new(&buffer, h);
            h.parallel_for(Range::new([5]), move |id: Id<1>| acc.set(id, 1));
        });
        let err = match result {
            Err(crate::core::error::OffloadError::Kernel(err)) => err,
            other => panic!("unexpected result: {:?}", other),
        };
        assert!(err.is_panic());
        assert_eq!(err.linear_id(), 4);
    }
}
