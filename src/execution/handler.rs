//! Command-group handler.
//!
//! A [`Handler`] exists for the duration of one `Queue::submit` callback.
//! Accessors are created against it, and it issues at most one
//! `parallel_for`. Whatever that dispatch produced is handed back to the
//! queue when the callback returns.

use crate::core::config::DispatchConfig;
use crate::core::error::{ConfigurationError, KernelOutput, OffloadResult};
use crate::core::index::{Range, WorkItem};
use crate::execution::dispatch::{dispatch, DispatchStats};
use crate::execution::pool::TaskPool;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Context object for one command group.
pub struct Handler<'q> {
    pool: &'q dyn TaskPool,
    config: &'q DispatchConfig,
    issued: Cell<bool>,
    duplicate: Cell<bool>,
    accessors: Cell<usize>,
    outcome: RefCell<Option<OffloadResult<DispatchStats>>>,
}

impl<'q> Handler<'q> {
    pub(crate) fn new(pool: &'q dyn TaskPool, config: &'q DispatchConfig) -> Self {
        Self {
            pool,
            config,
            issued: Cell::new(false),
            duplicate: Cell::new(false),
            accessors: Cell::new(0),
            outcome: RefCell::new(None),
        }
    }

    /// Run `kernel` once for every coordinate of `range`.
    ///
    /// The kernel may take an [`Id`](crate::core::index::Id) or an
    /// [`Item`](crate::core::index::Item) and may return `()` or
    /// `Result<(), E>`. Blocks until every work-item has returned. A second
    /// call on the same handler is rejected and does not run.
    pub fn parallel_for<const N: usize, I, K, R>(&self, range: impl Into<Range<N>>, kernel: K)
    where
        I: WorkItem<N>,
        K: Fn(I) -> R + Sync,
        R: KernelOutput,
    {
        if self.issued.replace(true) {
            log::warn!("ignoring second parallel_for in one command group");
            self.duplicate.set(true);
            return;
        }

        let result = dispatch(self.pool, self.config, range.into(), &kernel);
        *self.outcome.borrow_mut() = Some(result);
    }

    /// Record that an accessor was bound to this command group.
    pub(crate) fn register_accessor(&self) {
        self.accessors.set(self.accessors.get() + 1);
    }

    /// Number of accessors created against this command group.
    pub fn accessor_count(&self) -> usize {
        self.accessors.get()
    }

    /// Whether `parallel_for` has been issued.
    pub fn has_dispatched(&self) -> bool {
        self.issued.get()
    }

    /// Close the command group and return its dispatch outcome.
    ///
    /// `Ok(None)` means no `parallel_for` was issued. A kernel failure takes
    /// precedence over a duplicate `parallel_for`.
    pub(crate) fn finish(self) -> OffloadResult<Option<DispatchStats>> {
        let outcome = self.outcome.into_inner().transpose()?;
        if self.duplicate.get() {
            return Err(ConfigurationError::DuplicateParallelFor.into());
        }
        Ok(outcome)
    }
}

impl fmt::Debug for Handler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("workers", &self.pool.num_workers())
            .field("issued", &self.issued.get())
            .field("accessors", &self.accessors.get())
            .finish()
    }
}
